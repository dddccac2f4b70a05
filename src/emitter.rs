use anyhow::Result;
use log::{info, warn};

use crate::device::ScrollAxis;
use crate::session::MotionEvent;

/// Virtual output device for the decoded scroll motion. Falls back to a
/// no-op sink when uinput is unavailable so offline tooling still works.
pub struct UinputSink {
    enabled: bool,
    #[allow(dead_code)]
    linux: Option<Box<LinuxUinput>>,
}

impl UinputSink {
    pub fn new() -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            let dev = LinuxUinput::create()?;
            return Ok(Self {
                enabled: true,
                linux: Some(Box::new(dev)),
            });
        }
        #[allow(unreachable_code)]
        {
            warn!("uinput not available; running in NO-OP mode");
            Ok(Self {
                enabled: true,
                linux: None,
            })
        }
    }

    pub fn noop() -> Self {
        Self {
            enabled: true,
            linux: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
    pub fn set_enabled(&mut self, en: bool) {
        self.enabled = en;
    }

    /// Report one motion event on its axis. Does not sync; the pipeline
    /// syncs once per packet whether or not an event fired.
    pub fn emit(&mut self, ev: &MotionEvent) -> Result<()> {
        self.scroll(ev.axis, ev.delta)
    }

    pub fn scroll(&mut self, axis: ScrollAxis, steps: i32) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.scroll(axis, steps)?;
        }
        Ok(())
    }

    /// Frame boundary marker, one per processed packet.
    pub fn sync(&mut self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.sync()?;
        }
        Ok(())
    }
}

#[cfg(target_os = "linux")]
struct LinuxUinput {
    dev: uinput::device::Device,
}

#[cfg(target_os = "linux")]
impl LinuxUinput {
    fn create() -> Result<Self> {
        use uinput::event::relative;

        let dev = uinput::default()?
            .name("Fujitsu Scroll")?
            .event(relative::Wheel::Vertical)?
            .event(relative::Wheel::Horizontal)?
            .create()?;

        info!("uinput: created virtual scroll device");
        Ok(Self { dev })
    }

    fn sync(&mut self) -> Result<()> {
        self.dev.synchronize()?;
        Ok(())
    }

    fn scroll(&mut self, axis: ScrollAxis, steps: i32) -> Result<()> {
        use uinput::event::relative::Wheel;
        match axis {
            ScrollAxis::Vertical => self.dev.send(Wheel::Vertical, steps)?,
            ScrollAxis::Horizontal => self.dev.send(Wheel::Horizontal, steps)?,
        }
        Ok(())
    }
}
