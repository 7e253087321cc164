//! Line-oriented command shell driving a `Viewer`.
//!
//! Stands in for a GUI host: every gesture the viewer supports has a text
//! command, so the binary can be scripted from stdin and tests can drive the
//! whole pipeline without a display.
//!
//! ```text
//! open <path>                      browse a file's folder (or a folder)
//! next | prev | goto <n>           navigate (n is 1-based)
//! wait                             block until the current load finishes
//! rotate cw|ccw                    quarter turn, resets every panel
//! zoom <panel> in|out <x> <y>      wheel notch around a panel point
//! drag <panel> <l> <t> <r> <b>     selection overlay in progress
//! select <panel> <l> <t> <r> <b>   commit a selection
//! pan <panel> <dx> <dy>            drag the image
//! resize <panel> <w> <h>
//! fit <panel>                      cycle the fit mode
//! reset <panel>
//! show <panel> on|off
//! status | cache | flush | help | quit
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use log::debug;

use crate::core::raster::Rotation;
use crate::view::geometry::{PixelRect, Point, Size};
use crate::view::panel::{PanelId, Wheel};
use crate::viewer::{Navigation, Viewer};

/// How long `wait` blocks for a single load.
const WAIT_TIMEOUT: Duration = Duration::from_secs(30);

pub const HELP: &str = "\
commands:
  open <path>                     browse a file's folder (or a folder)
  next | prev | goto <n>          navigate (n is 1-based)
  wait                            block until the current load finishes
  rotate cw|ccw                   quarter turn, resets every panel
  zoom <panel> in|out <x> <y>     wheel notch around a panel point
  drag <panel> <l> <t> <r> <b>    selection overlay in progress
  select <panel> <l> <t> <r> <b>  commit a selection
  pan <panel> <dx> <dy>           drag the image
  resize <panel> <w> <h>
  fit <panel>                     cycle the fit mode
  reset <panel>
  show <panel> on|off
  status | cache | flush | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Open(PathBuf),
    Next,
    Prev,
    /// 1-based position.
    Goto(usize),
    Wait,
    Rotate(Rotation),
    Zoom { panel: String, wheel: Wheel, at: Point },
    Drag { panel: String, rect: PixelRect },
    Select { panel: String, rect: PixelRect },
    Pan { panel: String, dx: i32, dy: i32 },
    Resize { panel: String, size: Size },
    Fit(String),
    Reset(String),
    Show { panel: String, visible: bool },
    Status,
    Cache,
    Flush,
    Help,
    Quit,
}

fn arg<'a>(args: &[&'a str], i: usize, what: &str) -> Result<&'a str> {
    args.get(i).copied().ok_or_else(|| anyhow!("Missing {}", what))
}

fn num<T: FromStr>(args: &[&str], i: usize, what: &str) -> Result<T> {
    let raw = arg(args, i, what)?;
    raw.parse()
        .map_err(|_| anyhow!("Invalid {}: {}", what, raw))
}

fn rect(args: &[&str]) -> Result<PixelRect> {
    Ok(PixelRect::new(
        num(args, 1, "left")?,
        num(args, 2, "top")?,
        num(args, 3, "right")?,
        num(args, 4, "bottom")?,
    ))
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let args: Vec<&str> = rest.split_whitespace().collect();
        let panel = || arg(&args, 0, "panel").map(str::to_string);

        let cmd = match word.to_ascii_lowercase().as_str() {
            "open" | "o" => {
                if rest.is_empty() {
                    bail!("Missing path");
                }
                Command::Open(PathBuf::from(rest))
            }
            "next" | "n" => Command::Next,
            "prev" | "p" => Command::Prev,
            "goto" | "g" => {
                let n: usize = num(&args, 0, "position")?;
                if n == 0 {
                    bail!("Positions start at 1");
                }
                Command::Goto(n)
            }
            "wait" => Command::Wait,
            "rotate" | "r" => match arg(&args, 0, "direction")? {
                "cw" => Command::Rotate(Rotation::Clockwise),
                "ccw" => Command::Rotate(Rotation::CounterClockwise),
                other => bail!("Invalid direction: {} (cw|ccw)", other),
            },
            "zoom" | "z" => {
                let wheel = match arg(&args, 1, "in|out")? {
                    "in" | "+" => Wheel::In,
                    "out" | "-" => Wheel::Out,
                    other => bail!("Invalid zoom direction: {} (in|out)", other),
                };
                Command::Zoom {
                    panel: panel()?,
                    wheel,
                    at: Point::new(num(&args, 2, "x")?, num(&args, 3, "y")?),
                }
            }
            "drag" => Command::Drag { panel: panel()?, rect: rect(&args)? },
            "select" | "s" => Command::Select { panel: panel()?, rect: rect(&args)? },
            "pan" => Command::Pan {
                panel: panel()?,
                dx: num(&args, 1, "dx")?,
                dy: num(&args, 2, "dy")?,
            },
            "resize" => Command::Resize {
                panel: panel()?,
                size: Size::new(num(&args, 1, "width")?, num(&args, 2, "height")?),
            },
            "fit" => Command::Fit(panel()?),
            "reset" => Command::Reset(panel()?),
            "show" => {
                let visible = match arg(&args, 1, "on|off")? {
                    "on" | "1" | "true" => true,
                    "off" | "0" | "false" => false,
                    other => bail!("Invalid visibility: {} (on|off)", other),
                };
                Command::Show { panel: panel()?, visible }
            }
            "status" => Command::Status,
            "cache" => Command::Cache,
            "flush" => Command::Flush,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            "" => bail!("Empty command"),
            other => bail!("Unknown command: {} (try 'help')", other),
        };
        Ok(cmd)
    }
}

/// What the host should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Quit,
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Text(text) => f.write_str(text),
            Reply::Quit => f.write_str("bye"),
        }
    }
}

fn text(s: impl Into<String>) -> Result<Reply> {
    Ok(Reply::Text(s.into()))
}

fn describe(nav: &Navigation) -> String {
    match nav {
        Navigation::Same => "already showing".to_string(),
        Navigation::Shown(l) => format!("shown {}", l),
        Navigation::Loading(l) => format!("loading {}", l),
        Navigation::Empty => "nothing to show".to_string(),
        Navigation::Closed => "cache closed".to_string(),
    }
}

/// Viewer plus the command interpreter around it.
pub struct Shell {
    viewer: Viewer,
}

impl Shell {
    pub fn new(viewer: Viewer) -> Self {
        Self { viewer }
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn viewer_mut(&mut self) -> &mut Viewer {
        &mut self.viewer
    }

    pub fn into_viewer(self) -> Viewer {
        self.viewer
    }

    /// Parse and run one input line.
    pub fn execute_line(&mut self, line: &str) -> Result<Reply> {
        let cmd: Command = line.parse()?;
        self.execute(cmd)
    }

    pub fn execute(&mut self, cmd: Command) -> Result<Reply> {
        debug!("Shell: {:?}", cmd);
        let v = &mut self.viewer;
        match cmd {
            Command::Open(path) => {
                let nav = v
                    .open(&path)
                    .with_context(|| format!("Cannot open {}", path.display()))?;
                text(describe(&nav))
            }
            Command::Next => text(describe(&v.step(1))),
            Command::Prev => text(describe(&v.step(-1))),
            Command::Goto(n) => {
                let count = v.browser().map(|b| b.count()).unwrap_or(0);
                if n > count {
                    bail!("Position {} out of range (1..={})", n, count);
                }
                text(describe(&v.goto(n - 1)))
            }
            Command::Wait => {
                if v.wait_idle(WAIT_TIMEOUT) {
                    self.status()
                } else {
                    bail!("Timed out waiting for {:?}", v.pending().map(|l| l.to_string()))
                }
            }
            Command::Rotate(rotation) => {
                if !v.rotate(rotation) {
                    bail!("No image to rotate");
                }
                self.status()
            }
            Command::Zoom { panel, wheel, at } => {
                let id = self.panel(&panel)?;
                let v = &mut self.viewer;
                let changed = v.wheel(id, wheel, at);
                let zoom = v.panel(id).map(|p| p.zoom).unwrap_or(1.0);
                text(format!("{} zoom {:.3}{}", panel, zoom, if changed { "" } else { " (unchanged)" }))
            }
            Command::Drag { panel, rect } => {
                let id = self.panel(&panel)?;
                self.viewer.drag_selection(id, rect);
                text(format!("{} dragging", panel))
            }
            Command::Select { panel, rect } => {
                let id = self.panel(&panel)?;
                let changed = self.viewer.select(id, rect);
                text(format!("{} {}", panel, if changed { "cropped" } else { "selection ignored" }))
            }
            Command::Pan { panel, dx, dy } => {
                let id = self.panel(&panel)?;
                self.viewer.pan(id, dx, dy);
                let pan = self.viewer.panel(id).map(|p| p.pan).unwrap_or_default();
                text(format!("{} pan ({}, {})", panel, pan.x, pan.y))
            }
            Command::Resize { panel, size } => {
                let id = self.panel(&panel)?;
                self.viewer.resize(id, size);
                text(format!("{} {}x{}", panel, size.width, size.height))
            }
            Command::Fit(panel) => {
                let id = self.panel(&panel)?;
                let fit = self
                    .viewer
                    .cycle_fit(id)
                    .ok_or_else(|| anyhow!("Unknown panel: {}", panel))?;
                text(format!("{} fit {}", panel, fit))
            }
            Command::Reset(panel) => {
                let id = self.panel(&panel)?;
                self.viewer.reset(id);
                text(format!("{} reset", panel))
            }
            Command::Show { panel, visible } => {
                let id = self.panel(&panel)?;
                self.viewer.show(id, visible);
                text(format!("{} {}", panel, if visible { "shown" } else { "hidden" }))
            }
            Command::Status => self.status(),
            Command::Cache => {
                let cache = v.cache();
                let stats = cache.stats();
                let cached: Vec<String> = cache.cached().iter().map(|l| l.display_name()).collect();
                text(format!(
                    "{}/{} cached [{}], {} queued, hits {} misses {} evictions {} ({:.0}%)",
                    cache.len(),
                    cache.capacity(),
                    cached.join(", "),
                    cache.pending_len(),
                    stats.hits(),
                    stats.misses(),
                    stats.evictions(),
                    stats.hit_rate() * 100.0
                ))
            }
            Command::Flush => {
                v.flush();
                text("cache flushed")
            }
            Command::Help => text(HELP),
            Command::Quit => Ok(Reply::Quit),
        }
    }

    fn panel(&self, key: &str) -> Result<PanelId> {
        self.viewer
            .panel_id(key)
            .ok_or_else(|| anyhow!("Unknown panel: {}", key))
    }

    fn status(&self) -> Result<Reply> {
        let v = &self.viewer;
        let mut line = match v.image_status() {
            Some(status) => status.to_string(),
            None => "no image".to_string(),
        };
        if let Some(pending) = v.pending() {
            line.push_str(&format!(", loading {}", pending));
        }
        text(line)
    }
}
