//! Y4M stream adapters for the core frame type.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{bail, Context, Result};

use deshake_core::frame::{Frame, FrameInfo, PixelFormat};

pub type Reader = y4m::Decoder<BufReader<File>>;
pub type Writer = y4m::Encoder<BufWriter<File>>;

pub fn open_input(path: &Path) -> Result<(Reader, FrameInfo)> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let decoder = y4m::Decoder::new(BufReader::new(file))
        .map_err(|e| anyhow::anyhow!("reading Y4M header: {e}"))?;
    let format = map_colorspace(decoder.get_colorspace())?;
    let info = FrameInfo::new(
        decoder.get_width() as u32,
        decoder.get_height() as u32,
        format,
    )?;
    Ok((decoder, info))
}

pub fn open_output(path: &Path, reader: &Reader) -> Result<Writer> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    y4m::encode(
        reader.get_width(),
        reader.get_height(),
        reader.get_framerate(),
    )
    .with_colorspace(reader.get_colorspace())
    .write_header(BufWriter::new(file))
    .map_err(|e| anyhow::anyhow!("writing Y4M header: {e}"))
}

fn map_colorspace(cs: y4m::Colorspace) -> Result<PixelFormat> {
    use y4m::Colorspace::*;
    Ok(match cs {
        Cmono => PixelFormat::Gray8,
        C420 | C420jpeg | C420paldv | C420mpeg2 => PixelFormat::Yuv420p,
        C422 => PixelFormat::Yuv422p,
        C444 => PixelFormat::Yuv444p,
        other => bail!("unsupported Y4M colorspace {other:?}"),
    })
}

/// Reads the next frame into a core frame; `None` at end of stream.
pub fn read_frame(reader: &mut Reader, info: &FrameInfo) -> Result<Option<Frame>> {
    let raw = match reader.read_frame() {
        Ok(f) => f,
        Err(y4m::Error::EOF) => return Ok(None),
        Err(e) => bail!("reading Y4M frame: {e}"),
    };
    let mut frame = Frame::allocate(*info)?;
    for (idx, data) in [raw.get_y_plane(), raw.get_u_plane(), raw.get_v_plane()]
        .into_iter()
        .enumerate()
        .take(info.format.plane_count())
    {
        let plane = frame.plane_mut(idx);
        let row = plane.width;
        for y in 0..plane.height {
            plane.row_mut(y)[..row].copy_from_slice(&data[y * row..(y + 1) * row]);
        }
    }
    Ok(Some(frame))
}

/// Appends a core frame to the output stream.
pub fn write_frame(writer: &mut Writer, frame: &Frame) -> Result<()> {
    let info = frame.info();
    let mut planes: Vec<Vec<u8>> = Vec::with_capacity(3);
    for idx in 0..info.format.plane_count().min(3) {
        let plane = frame.plane(idx);
        let mut data = Vec::with_capacity(plane.width * plane.height);
        for y in 0..plane.height {
            data.extend_from_slice(&plane.row(y)[..plane.width]);
        }
        planes.push(data);
    }
    while planes.len() < 3 {
        planes.push(Vec::new());
    }
    let out = y4m::Frame::new(
        [planes[0].as_slice(), planes[1].as_slice(), planes[2].as_slice()],
        None,
    );
    writer
        .write_frame(&out)
        .map_err(|e| anyhow::anyhow!("writing Y4M frame: {e}"))?;
    Ok(())
}
