//! Legacy human-readable per-frame formats.
//!
//! Motions, one line per frame:
//!
//! ```text
//! VID.STAB 1
//! # comment
//! Frame 1 (List 2 [(LM vx vy fx fy fsize contrast match),(LM ...)])
//! ```
//!
//! Pre-computed transforms use `Trans` lines instead:
//!
//! ```text
//! Trans 1.5 -0.25 0.001 0 0
//! ```

use std::io::{BufRead, Write};

use crate::error::{DeshakeError, Result};
use crate::geometry::Vec2;
use crate::motion::{Field, LocalMotion};
use crate::transform::Transform;

const VERSION: u32 = 1;

/// Writes the file header.
pub fn write_header<W: Write>(w: &mut W) -> Result<()> {
    writeln!(w, "VID.STAB {VERSION}")?;
    Ok(())
}

/// Writes one frame line.
pub fn write_frame<W: Write>(w: &mut W, frame: u64, motions: &[LocalMotion]) -> Result<()> {
    write!(w, "Frame {frame} (List {} [", motions.len())?;
    for (i, m) in motions.iter().enumerate() {
        if i > 0 {
            write!(w, ",")?;
        }
        write!(
            w,
            "(LM {} {} {} {} {} {:.6} {:.6})",
            m.v.x, m.v.y, m.f.pos.x, m.f.pos.y, m.f.size, m.contrast, m.match_quality
        )?;
    }
    writeln!(w, "])")?;
    Ok(())
}

/// Reads a whole motions file: `(frame number, motions)` per line.
/// Comment lines start with `#` and are skipped.
pub fn read_motions<R: BufRead>(r: R) -> Result<Vec<(u64, Vec<LocalMotion>)>> {
    let mut lines = r.lines();

    let header = loop {
        match lines.next() {
            Some(line) => {
                let line = line?;
                if line.trim().is_empty() || line.starts_with('#') {
                    continue;
                }
                break line;
            }
            None => {
                return Err(DeshakeError::SerializationMismatch(
                    "missing VID.STAB header".into(),
                ))
            }
        }
    };
    let version: u32 = header
        .strip_prefix("VID.STAB ")
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| {
            DeshakeError::SerializationMismatch(format!("bad header line {header:?}"))
        })?;
    if version != VERSION {
        return Err(DeshakeError::SerializationMismatch(format!(
            "unsupported motions version {version}"
        )));
    }

    let mut frames = Vec::new();
    for line in lines {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        frames.push(parse_frame_line(trimmed)?);
    }
    Ok(frames)
}

/// Writes one pre-computed per-frame transform.
pub fn write_transform<W: Write>(w: &mut W, t: &Transform) -> Result<()> {
    writeln!(
        w,
        "Trans {:.6} {:.6} {:.6} {:.6} {}",
        t.x, t.y, t.alpha, t.zoom, t.extra
    )?;
    Ok(())
}

/// Reads a file of `Trans` lines, one transform per frame.
pub fn read_transforms<R: BufRead>(r: R) -> Result<Vec<Transform>> {
    let mut out = Vec::new();
    for line in r.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("VID.STAB") {
            continue;
        }
        let rest = trimmed.strip_prefix("Trans ").ok_or_else(|| {
            DeshakeError::SerializationMismatch(format!("expected Trans line, got {trimmed:?}"))
        })?;
        let fields: Vec<&str> = rest.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(DeshakeError::SerializationMismatch(format!(
                "wrong Trans field count in {trimmed:?}"
            )));
        }
        let float = |s: &str| {
            s.parse::<f64>().map_err(|_| {
                DeshakeError::SerializationMismatch(format!("bad number in {trimmed:?}"))
            })
        };
        out.push(Transform {
            x: float(fields[0])?,
            y: float(fields[1])?,
            alpha: float(fields[2])?,
            zoom: float(fields[3])?,
            extra: fields[4].parse().map_err(|_| {
                DeshakeError::SerializationMismatch(format!("bad extra flag in {trimmed:?}"))
            })?,
            ..Default::default()
        });
    }
    Ok(out)
}

/// Peeks at a motions/transforms text file to tell the two layouts apart.
pub fn is_transforms_text(first_nonempty_line: &str) -> bool {
    first_nonempty_line.trim_start().starts_with("Trans ")
}

fn parse_frame_line(line: &str) -> Result<(u64, Vec<LocalMotion>)> {
    let bad = |what: &str| {
        DeshakeError::SerializationMismatch(format!("{what} in motions line {line:?}"))
    };

    let rest = line.strip_prefix("Frame ").ok_or_else(|| bad("no Frame"))?;
    let (num, rest) = rest.split_once(' ').ok_or_else(|| bad("no frame number"))?;
    let frame: u64 = num.parse().map_err(|_| bad("bad frame number"))?;

    let rest = rest
        .strip_prefix("(List ")
        .ok_or_else(|| bad("no List"))?;
    let (len, rest) = rest.split_once(' ').ok_or_else(|| bad("no list length"))?;
    let len: usize = len.parse().map_err(|_| bad("bad list length"))?;

    let body = rest
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix("])"))
        .ok_or_else(|| bad("unterminated list"))?;

    let mut motions = Vec::with_capacity(len);
    if !body.is_empty() {
        for entry in body.split("),(") {
            let entry = entry
                .trim_start_matches('(')
                .trim_end_matches(')')
                .strip_prefix("LM ")
                .ok_or_else(|| bad("no LM entry"))?;
            let fields: Vec<&str> = entry.split_whitespace().collect();
            if fields.len() != 7 {
                return Err(bad("wrong LM field count"));
            }
            let int = |s: &str| s.parse::<i32>().map_err(|_| bad("bad LM integer"));
            let float = |s: &str| s.parse::<f64>().map_err(|_| bad("bad LM float"));
            motions.push(LocalMotion {
                v: Vec2::new(int(fields[0])?, int(fields[1])?),
                f: Field {
                    pos: Vec2::new(int(fields[2])?, int(fields[3])?),
                    size: int(fields[4])?.max(0) as u32,
                },
                contrast: float(fields[5])?,
                match_quality: float(fields[6])?,
            });
        }
    }
    if motions.len() != len {
        return Err(bad("list length mismatch"));
    }
    Ok((frame, motions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip() {
        let motions = vec![
            LocalMotion {
                v: Vec2::new(-2, 1),
                f: Field {
                    pos: Vec2::new(100, 80),
                    size: 16,
                },
                contrast: 0.5,
                match_quality: 0.25,
            },
            LocalMotion {
                v: Vec2::new(3, 0),
                f: Field {
                    pos: Vec2::new(200, 80),
                    size: 16,
                },
                contrast: 0.75,
                match_quality: 0.125,
            },
        ];
        let mut buf = Vec::new();
        write_header(&mut buf).unwrap();
        write_frame(&mut buf, 1, &motions).unwrap();
        write_frame(&mut buf, 2, &[]).unwrap();

        let parsed = read_motions(Cursor::new(buf)).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].0, 1);
        assert_eq!(parsed[0].1, motions);
        assert!(parsed[1].1.is_empty());
    }

    #[test]
    fn comments_are_skipped() {
        let text = "# generated\nVID.STAB 1\n# a comment\nFrame 1 (List 0 [])\n";
        let parsed = read_motions(Cursor::new(text)).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn wrong_version_rejected() {
        let text = "VID.STAB 2\n";
        assert!(read_motions(Cursor::new(text)).is_err());
    }

    #[test]
    fn transforms_roundtrip() {
        let ts = vec![
            Transform::new(1.5, -0.25, 0.001, 0.0),
            Transform {
                extra: 1,
                ..Transform::new(-3.0, 2.0, -0.01, 5.0)
            },
        ];
        let mut buf = Vec::new();
        for t in &ts {
            write_transform(&mut buf, t).unwrap();
        }
        let parsed = read_transforms(Cursor::new(buf)).unwrap();
        assert_eq!(parsed, ts);
        assert!(is_transforms_text("Trans 0 0 0 0 0"));
        assert!(!is_transforms_text("Frame 1 (List 0 [])"));
    }

    #[test]
    fn malformed_transform_lines_rejected() {
        assert!(read_transforms(Cursor::new("Trans 1 2 3\n")).is_err());
        assert!(read_transforms(Cursor::new("Nonsense\n")).is_err());
    }
}
