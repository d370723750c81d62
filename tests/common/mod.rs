//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

use shiny_hunter::{
    FrameSource, HuntEvent, HunterError, InputActuator, KeyPress, LogicalAction, Rect, Result,
};

/// Route the crate's `log` output through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub const SPRITE_SIZE: u32 = 16;

/// The "normal" sprite every reference is built from
pub fn sprite() -> RgbImage {
    RgbImage::from_fn(SPRITE_SIZE, SPRITE_SIZE, |x, y| {
        Rgb([(x * 16) as u8, (y * 16) as u8, 90])
    })
}

/// A capture that cannot match `sprite()`
pub fn shiny() -> RgbImage {
    RgbImage::from_pixel(SPRITE_SIZE, SPRITE_SIZE, Rgb([255, 0, 0]))
}

pub fn sprite_rect() -> Rect {
    Rect::new(0, 0, SPRITE_SIZE as i32, SPRITE_SIZE as i32)
}

/// Two sprites side by side: regions at x 0..16 and 16..32
pub fn pair(left: &RgbImage, right: &RgbImage) -> RgbImage {
    let mut frame = RgbImage::new(SPRITE_SIZE * 2, SPRITE_SIZE);
    image::imageops::replace(&mut frame, left, 0, 0);
    image::imageops::replace(&mut frame, right, SPRITE_SIZE as i64, 0);
    frame
}

/// Plays a fixed list of frames, one per attempt, then repeats the last one
pub struct ScriptedSource {
    frames: Vec<RgbImage>,
    current: usize,
    advances: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self {
            frames,
            current: 0,
            advances: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter of attempts made against this source
    pub fn advances(&self) -> Arc<AtomicUsize> {
        self.advances.clone()
    }
}

impl FrameSource for ScriptedSource {
    fn advance(&mut self) -> Result<()> {
        let n = self.advances.fetch_add(1, Ordering::SeqCst);
        self.current = n.min(self.frames.len() - 1);
        Ok(())
    }

    fn capture(&mut self, rect: Rect) -> Result<RgbImage> {
        let frame = &self.frames[self.current];
        if rect.x2 as u32 > frame.width() || rect.y2 as u32 > frame.height() {
            return Err(HunterError::capture("window closed"));
        }
        Ok(image::imageops::crop_imm(
            frame,
            rect.x1 as u32,
            rect.y1 as u32,
            rect.width() as u32,
            rect.height() as u32,
        )
        .to_image())
    }
}

/// Records every press; optionally fails them all
#[derive(Clone, Default)]
pub struct RecordingActuator {
    presses: Arc<Mutex<Vec<KeyPress>>>,
    fail: bool,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn presses(&self) -> Vec<KeyPress> {
        self.presses.lock().clone()
    }

    pub fn actions(&self) -> Vec<LogicalAction> {
        self.presses.lock().iter().map(|p| p.action).collect()
    }
}

impl InputActuator for RecordingActuator {
    fn press(&mut self, press: &KeyPress) -> Result<()> {
        if self.fail {
            return Err(HunterError::actuation(format!("{} not delivered", press.key)));
        }
        self.presses.lock().push(press.clone());
        Ok(())
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// Receive events until one satisfies `matches`
pub fn wait_for_event(
    events: &Receiver<HuntEvent>,
    timeout: Duration,
    matches: impl Fn(&HuntEvent) -> bool,
) -> Option<HuntEvent> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.checked_duration_since(Instant::now())?;
        match events.recv_timeout(remaining) {
            Ok(event) if matches(&event) => return Some(event),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}
