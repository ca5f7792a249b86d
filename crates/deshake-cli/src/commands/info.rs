use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use console::style;

use deshake_core::io::binary::Deserializer;

use crate::video;

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Y4M stream or binary transforms file
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let mut header = [0u8; 8];
    {
        let mut f =
            File::open(&args.file).with_context(|| format!("opening {}", args.file.display()))?;
        let n = f.read(&mut header)?;
        header[n..].fill(0);
    }

    if &header == b"GBLF0001" {
        let file = Deserializer::load(&args.file)?;
        println!("{}", style("binary transforms file").bold());
        println!("  frame size: {}x{}", file.dim.x, file.dim.y);
        println!("  frames:     {}", file.frames.len());
        let cells: usize = file.frames.iter().map(|f| f.len()).sum();
        let avg = if file.frames.is_empty() {
            0.0
        } else {
            cells as f64 / file.frames.len() as f64
        };
        println!("  valid cells: {cells} ({avg:.1} per frame)");
    } else {
        let (mut reader, info) = video::open_input(&args.file)?;
        println!("{}", style("Y4M stream").bold());
        println!("  frame size: {}x{}", info.width, info.height);
        println!("  format:     {:?}", info.format);
        let rate = reader.get_framerate();
        println!("  framerate:  {}/{}", rate.num, rate.den);
        let mut frames = 0u64;
        while let Some(_f) = video::read_frame(&mut reader, &info)? {
            frames += 1;
        }
        println!("  frames:     {frames}");
    }
    Ok(())
}
