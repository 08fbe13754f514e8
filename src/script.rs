//! Display-list scripts: a line-oriented text format replayed frame by
//! frame into any [`DrawDevice`].
//!
//! ```text
//! # square at half brightness
//! I 0.5
//! P -0.25 -0.25
//! L 0.25 -0.25
//! L 0.25 0.25 0.8
//! C 0.1
//! F
//! ```

use std::path::Path;

use anyhow::Context;
use nom::IResult;
use nom::Parser;
use nom::character::complete::{char, space0, space1};
use nom::combinator::{all_consuming, opt};
use nom::number::complete::float;
use nom::sequence::{preceded, terminated};

use crate::draw::DrawDevice;
use crate::types::Point;

/// A parsed script command.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    /// `I i`
    Intensity(f32),
    /// `P x y`
    SetPoint(Point),
    /// `L x y [i]`
    Line { to: Point, intensity: Option<f32> },
    /// `C r`
    Circle(f32),
    /// `F`
    FrameEnd,
}

fn sp_float(input: &str) -> IResult<&str, f32> {
    preceded(space1, float).parse(input)
}

fn sp_point(input: &str) -> IResult<&str, Point> {
    let (rest, (x, y)) = (sp_float, sp_float).parse(input)?;
    Ok((rest, Point::new(x, y)))
}

fn command(input: &str) -> IResult<&str, Command> {
    let intensity = preceded(char('I'), sp_float).map(Command::Intensity);
    let set_point = preceded(char('P'), sp_point).map(Command::SetPoint);
    let line = preceded(char('L'), (sp_point, opt(sp_float)))
        .map(|(to, intensity)| Command::Line { to, intensity });
    let circle = preceded(char('C'), sp_float).map(Command::Circle);
    let frame_end = char('F').map(|_| Command::FrameEnd);
    nom::branch::alt((intensity, set_point, line, circle, frame_end)).parse(input)
}

/// Parse one line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> anyhow::Result<Option<Command>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    match all_consuming(terminated(command, space0)).parse(trimmed) {
        Ok((_, cmd)) => Ok(Some(cmd)),
        Err(_) => anyhow::bail!("unknown command: {trimmed}"),
    }
}

/// Frames of drawing commands, played in a loop.
#[derive(Clone, Debug, Default)]
pub struct Script {
    frames: Vec<Vec<Command>>,
    position: usize,
}

impl Script {
    /// Parse a whole script. Commands after the last `F` form a final
    /// frame of their own.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let mut frames = Vec::new();
        let mut current = Vec::new();
        for (number, line) in text.lines().enumerate() {
            match parse_line(line).with_context(|| format!("line {}", number + 1))? {
                Some(Command::FrameEnd) => frames.push(std::mem::take(&mut current)),
                Some(cmd) => current.push(cmd),
                None => {}
            }
        }
        if !current.is_empty() {
            frames.push(current);
        }
        Ok(Self {
            frames,
            position: 0,
        })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading script {}", path.display()))?;
        let script = Self::parse(&text).with_context(|| format!("parsing {}", path.display()))?;
        tracing::info!(path = %path.display(), frames = script.frames.len(), "script loaded");
        Ok(script)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Issue the next frame's commands to `device`, wrapping around at
    /// the end. Does not call `begin` or `submit`.
    pub fn play_next(&mut self, device: &mut dyn DrawDevice) {
        let Some(frame) = self.frames.get(self.position) else {
            return;
        };
        for cmd in frame {
            match *cmd {
                Command::Intensity(i) => device.set_intensity(i),
                Command::SetPoint(p) => device.set_point(p),
                Command::Line { to, intensity } => device.draw_line(to, intensity),
                Command::Circle(r) => device.draw_circle(r),
                Command::FrameEnd => {}
            }
        }
        self.position = (self.position + 1) % self.frames.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::Recorder;
    use crate::types::GraphicsPrimitive;

    #[test]
    fn parse_each_command() {
        assert_eq!(parse_line("I 0.75").unwrap(), Some(Command::Intensity(0.75)));
        assert_eq!(
            parse_line("P -0.25 0.5").unwrap(),
            Some(Command::SetPoint(Point::new(-0.25, 0.5)))
        );
        assert_eq!(
            parse_line("L 0.5 0").unwrap(),
            Some(Command::Line {
                to: Point::new(0.5, 0.0),
                intensity: None
            })
        );
        assert_eq!(
            parse_line("  L 0.5 0 0.2  ").unwrap(),
            Some(Command::Line {
                to: Point::new(0.5, 0.0),
                intensity: Some(0.2)
            })
        );
        assert_eq!(parse_line("C 0.125").unwrap(), Some(Command::Circle(0.125)));
        assert_eq!(parse_line("F").unwrap(), Some(Command::FrameEnd));
    }

    #[test]
    fn comments_and_blanks_are_skipped() {
        assert!(parse_line("# hello").unwrap().is_none());
        assert!(parse_line("").unwrap().is_none());
        assert!(parse_line("   ").unwrap().is_none());
    }

    #[test]
    fn malformed_lines_are_errors() {
        assert!(parse_line("X 1 2").is_err());
        assert!(parse_line("P 0.5").is_err());
        assert!(parse_line("C 0.1 0.2 0.3").is_err());
        assert!(parse_line("Fnord").is_err());
    }

    #[test]
    fn script_error_names_the_line() {
        let err = Script::parse("I 0.5\nP 1\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn frames_split_on_f_and_wrap() {
        let mut script = Script::parse("P 0.1 0.1\nF\n# second\nP 0.2 0.2\nC 0.1\n").unwrap();
        assert_eq!(script.frame_count(), 2);

        let mut rec = Recorder::new();
        script.play_next(&mut RecorderDevice(&mut rec));
        assert_eq!(rec.frame().len(), 1);

        rec.begin();
        script.play_next(&mut RecorderDevice(&mut rec));
        assert_eq!(rec.frame().len(), 2);
        assert!(matches!(rec.frame()[1], GraphicsPrimitive::Circle { .. }));

        rec.begin();
        script.play_next(&mut RecorderDevice(&mut rec));
        assert_eq!(rec.frame()[0].intensity(), 0.5);
        assert_eq!(rec.current_point(), Point::new(0.1, 0.1));
    }

    #[test]
    fn empty_script_plays_nothing() {
        let mut script = Script::parse("# nothing\n").unwrap();
        let mut rec = Recorder::new();
        script.play_next(&mut RecorderDevice(&mut rec));
        assert!(rec.frame().is_empty());
    }

    /// Minimal device that only records.
    struct RecorderDevice<'a>(&'a mut Recorder);

    impl DrawDevice for RecorderDevice<'_> {
        fn wait_sync(&mut self, _timeout: std::time::Duration) -> bool {
            true
        }

        fn begin(&mut self) {
            self.0.begin();
        }

        fn submit(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        fn set_point(&mut self, p: Point) {
            self.0.set_point(p);
        }

        fn set_intensity(&mut self, intensity: f32) {
            self.0.set_intensity(intensity);
        }

        fn draw_circle(&mut self, radius: f32) {
            self.0.draw_circle(radius);
        }

        fn draw_line(&mut self, to: Point, intensity: Option<f32>) {
            self.0.draw_line(to, intensity);
        }
    }
}
