use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use deshake_core::corrector::{Corrector, CorrectorConfig};
use deshake_core::frame::FrameInfo;
use deshake_core::io::binary::Deserializer;
use deshake_core::io::text;
use deshake_core::motion::motions_to_transform;
use deshake_core::transform::smooth::{CamPath, OptZoom};
use deshake_core::transform::Transform;
use deshake_core::warp::{CropMode, Interpolation};

use crate::video;

#[derive(Args, Debug)]
pub struct TransformArgs {
    /// Input Y4M file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Transforms file from the detect pass
    #[arg(short, long)]
    pub transforms: PathBuf,

    /// Output Y4M file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Smoothing half-window in frames
    #[arg(long, default_value_t = 15)]
    pub smoothing: u32,

    /// Maximum translation in pixels (-1 = unlimited)
    #[arg(long, default_value_t = -1)]
    pub maxshift: i32,

    /// Maximum rotation in radians (-1 = unlimited)
    #[arg(long, default_value_t = -1.0)]
    pub maxangle: f64,

    /// Border policy: keep or black
    #[arg(long, value_enum, default_value = "keep")]
    pub crop: CropArg,

    /// Additional zoom percentage
    #[arg(long, default_value_t = 0.0)]
    pub zoom: f64,

    /// Optimal zoom: 0 off, 1 static, 2 adaptive
    #[arg(long, default_value_t = 1)]
    pub optzoom: u8,

    /// Zoom change per frame for --optzoom 2
    #[arg(long, default_value_t = 0.25)]
    pub zoomspeed: f64,

    /// Interpolation: zero, linear, bilinear or bicubic
    #[arg(long, value_enum, default_value = "bilinear")]
    pub interpol: InterpolArg,

    /// Camera path smoother: avg, gaussian or optimall1
    #[arg(long, value_enum, default_value = "gaussian")]
    pub campath: CamPathArg,

    /// Invert the corrections
    #[arg(long)]
    pub invert: bool,

    /// Barrel distortion coefficients k0,k1,k2
    #[arg(long, num_args = 3, value_delimiter = ',')]
    pub lens: Option<Vec<f32>>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum CropArg {
    Keep,
    Black,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum InterpolArg {
    Zero,
    Linear,
    Bilinear,
    Bicubic,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum CamPathArg {
    Avg,
    Gaussian,
    Optimall1,
}

impl TransformArgs {
    pub fn config(&self) -> CorrectorConfig {
        CorrectorConfig {
            smoothing: self.smoothing,
            max_shift: self.maxshift,
            max_angle: self.maxangle,
            crop: match self.crop {
                CropArg::Keep => CropMode::Keep,
                CropArg::Black => CropMode::Black,
            },
            zoom: self.zoom,
            opt_zoom: match self.optzoom {
                0 => OptZoom::Off,
                2 => OptZoom::Adaptive,
                _ => OptZoom::Static,
            },
            zoom_speed: self.zoomspeed,
            interpol: match self.interpol {
                InterpolArg::Zero => Interpolation::Zero,
                InterpolArg::Linear => Interpolation::Linear,
                InterpolArg::Bilinear => Interpolation::Bilinear,
                InterpolArg::Bicubic => Interpolation::Bicubic,
            },
            cam_path: match self.campath {
                CamPathArg::Avg => CamPath::Avg,
                CamPathArg::Gaussian => CamPath::Gaussian,
                CamPathArg::Optimall1 => CamPath::OptimalL1,
            },
            relative: true,
            invert: self.invert,
            lens_k: match &self.lens {
                Some(k) => [k[0], k[1], k[2]],
                None => [0.0; 3],
            },
        }
    }
}

/// Loads per-frame raw transforms from either transforms format.
pub fn load_transforms(path: &Path, info: &FrameInfo, conf: &CorrectorConfig) -> Result<Corrector> {
    let mut header = [0u8; 8];
    {
        use std::io::Read;
        let mut f = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let n = f.read(&mut header)?;
        header[n..].fill(0);
    }

    if &header == b"GBLF0001" {
        let file = Deserializer::load(path)?;
        return Ok(Corrector::from_motion_file(&file, *info, *conf)?);
    }

    let raw = std::fs::read_to_string(path)?;
    let first = raw
        .lines()
        .find(|l| {
            let t = l.trim();
            !t.is_empty() && !t.starts_with('#') && !t.starts_with("VID.STAB")
        })
        .unwrap_or_default();

    let ts: Vec<Transform> = if text::is_transforms_text(first) {
        text::read_transforms(BufReader::new(raw.as_bytes()))?
    } else {
        let frames = text::read_motions(BufReader::new(raw.as_bytes()))?;
        let min_radius = (info.width.min(info.height) / 7).max(16) as f64;
        frames
            .iter()
            .map(|(_, motions)| motions_to_transform(info, motions, min_radius))
            .collect()
    };
    Ok(Corrector::from_transforms(ts, *info, *conf)?)
}

pub fn run(args: &TransformArgs) -> Result<()> {
    let (mut reader, info) = video::open_input(&args.input)?;
    let conf = args.config();
    let mut corrector = load_transforms(&args.transforms, &info, &conf)?;

    let bar = ProgressBar::new(corrector.len() as u64).with_style(
        ProgressStyle::with_template("{bar:30} {pos}/{len} frames {eta}")
            .expect("static template"),
    );

    let mut writer = video::open_output(&args.output, &reader)?;
    let mut dst = deshake_core::frame::Frame::allocate(info)?;
    let mut frames = 0u64;
    while let Some(src) = video::read_frame(&mut reader, &info)? {
        corrector.apply_next(&src, &mut dst)?;
        video::write_frame(&mut writer, &dst)?;
        frames += 1;
        bar.inc(1);
    }
    bar.finish_and_clear();

    println!(
        "{} {} frames -> {}",
        console::style("stabilized").green().bold(),
        frames,
        args.output.display()
    );
    Ok(())
}
