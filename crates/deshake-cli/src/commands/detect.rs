use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use deshake_core::detect::fields::FieldDetector;
use deshake_core::detect::{Detector, DetectorConfig};
use deshake_core::io::binary::Serializer;
use deshake_core::io::text;

use crate::video;

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Input Y4M file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output transforms file (binary, or text with --legacy)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Use the legacy field detector and the text transforms format
    #[arg(long)]
    pub legacy: bool,

    /// Write frames with the detection overlay to this Y4M file
    #[arg(long)]
    pub visual: Option<PathBuf>,

    /// Shakiness of the footage, 1-10
    #[arg(long, default_value_t = 5)]
    pub shakiness: u32,

    /// Detection accuracy, 1-15
    #[arg(long, default_value_t = 15)]
    pub accuracy: u32,

    /// Coarse search step
    #[arg(long, default_value_t = 6)]
    pub stepsize: u32,

    /// Minimum field contrast, 0.0-1.0
    #[arg(long, default_value_t = 0.25)]
    pub mincontrast: f64,

    /// Overlay level for --visual: 1 fields, 2 also search areas
    #[arg(long, default_value_t = 1)]
    pub show: u32,

    /// Use frame N as a permanent reference (0 disables)
    #[arg(long, default_value_t = 0)]
    pub tripod: u64,
}

impl DetectArgs {
    fn config(&self) -> DetectorConfig {
        DetectorConfig {
            shakiness: self.shakiness,
            accuracy: self.accuracy,
            step_size: self.stepsize,
            min_contrast: self.mincontrast,
            show: if self.visual.is_some() { self.show } else { 0 },
            virtual_tripod: self.tripod,
        }
    }
}

pub fn run(args: &DetectArgs) -> Result<()> {
    let (mut reader, info) = video::open_input(&args.input)?;
    let mut visual_out = match &args.visual {
        Some(path) => Some(video::open_output(path, &reader)?),
        None => None,
    };

    let bar = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} detected {pos} frames ({per_sec})")
            .expect("static template"),
    );

    let mut frames = 0u64;
    if args.legacy {
        let mut detector = FieldDetector::new(info, args.config())?;
        let mut out = BufWriter::new(
            File::create(&args.output)
                .with_context(|| format!("creating {}", args.output.display()))?,
        );
        text::write_header(&mut out)?;
        while let Some(mut frame) = video::read_frame(&mut reader, &info)? {
            let motions = detector.process_frame(&frame)?;
            text::write_frame(&mut out, frames, &motions)?;
            if let Some(w) = &mut visual_out {
                if args.show > 0 {
                    let max_shift = (info.width.min(info.height) as i32 / 7).max(16);
                    deshake_core::detect::draw::motions_overlay(
                        &mut frame, &motions, args.show, max_shift,
                    );
                }
                video::write_frame(w, &frame)?;
            }
            frames += 1;
            bar.inc(1);
        }
    } else {
        let mut detector = Detector::new(info, args.config())?;
        detector.attach_serializer(Serializer::create(&args.output, info.dim())?);
        while let Some(mut frame) = video::read_frame(&mut reader, &info)? {
            detector.process_frame(&mut frame)?;
            if let Some(w) = &mut visual_out {
                video::write_frame(w, &frame)?;
            }
            frames += 1;
            bar.inc(1);
        }
    }
    bar.finish_and_clear();

    println!(
        "{} {} frames -> {}",
        console::style("detected").green().bold(),
        frames,
        args.output.display()
    );
    Ok(())
}
