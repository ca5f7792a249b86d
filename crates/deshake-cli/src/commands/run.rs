use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use tracing::info;

use deshake_core::corrector::{Corrector, CorrectorConfig};
use deshake_core::detect::fields::FieldDetector;
use deshake_core::detect::{Detector, DetectorConfig};
use deshake_core::io::binary::{Deserializer, Serializer};
use deshake_core::io::text;
use deshake_core::motion::motions_to_transform;
use deshake_core::transform::Transform;

use crate::video;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// TOML pipeline configuration
    #[arg(short, long)]
    pub config: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct PipelineConfig {
    input: PathBuf,
    output: PathBuf,
    /// Intermediate transforms file; derived from `output` when empty.
    transforms: Option<PathBuf>,
    /// Use the legacy field detector and text transforms.
    legacy: bool,
    detector: DetectorConfig,
    corrector: CorrectorConfig,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.config)
        .with_context(|| format!("reading {}", args.config.display()))?;
    let conf: PipelineConfig = toml::from_str(&raw)
        .with_context(|| format!("parsing {}", args.config.display()))?;

    let transforms_path = conf
        .transforms
        .clone()
        .unwrap_or_else(|| conf.output.with_extension(if conf.legacy { "trf" } else { "gbl" }));

    // Pass one: detect.
    let (mut reader, info) = video::open_input(&conf.input)?;
    info!(input = %conf.input.display(), "detection pass");
    if conf.legacy {
        let mut detector = FieldDetector::new(info, conf.detector)?;
        let mut out = BufWriter::new(File::create(&transforms_path)?);
        text::write_header(&mut out)?;
        let mut n = 0u64;
        while let Some(frame) = video::read_frame(&mut reader, &info)? {
            let motions = detector.process_frame(&frame)?;
            text::write_frame(&mut out, n, &motions)?;
            n += 1;
        }
    } else {
        let mut detector = Detector::new(info, conf.detector)?;
        detector.attach_serializer(Serializer::create(&transforms_path, info.dim())?);
        while let Some(mut frame) = video::read_frame(&mut reader, &info)? {
            detector.process_frame(&mut frame)?;
        }
    }

    // Pass two: transform.
    info!(output = %conf.output.display(), "correction pass");
    let mut corrector = if conf.legacy {
        let reader = std::io::BufReader::new(File::open(&transforms_path)?);
        let frames = text::read_motions(reader)?;
        let min_radius = (info.width.min(info.height) / 7).max(16) as f64;
        let ts: Vec<Transform> = frames
            .iter()
            .map(|(_, motions)| motions_to_transform(&info, motions, min_radius))
            .collect();
        Corrector::from_transforms(ts, info, conf.corrector)?
    } else {
        let file = Deserializer::load(&transforms_path)?;
        Corrector::from_motion_file(&file, info, conf.corrector)?
    };

    let (mut reader, _) = video::open_input(&conf.input)?;
    let mut writer = video::open_output(&conf.output, &reader)?;
    let mut dst = deshake_core::frame::Frame::allocate(info)?;
    let mut frames = 0u64;
    while let Some(src) = video::read_frame(&mut reader, &info)? {
        corrector.apply_next(&src, &mut dst)?;
        video::write_frame(&mut writer, &dst)?;
        frames += 1;
    }

    println!(
        "{} {} frames -> {}",
        console::style("stabilized").green().bold(),
        frames,
        conf.output.display()
    );
    Ok(())
}
