//! TorchScript plumbing shared by the detector variants: device selection,
//! image-to-tensor conversion, and the forward pass.

use anyhow::{bail, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use tch::{CModule, Device, Kind, Tensor};

pub(crate) fn select_device(gpu: usize) -> Device {
    if tch::Cuda::is_available() {
        Device::Cuda(gpu)
    } else {
        Device::Cpu
    }
}

/// Resize to the network input size and produce a normalized NCHW tensor.
pub(crate) fn image_tensor(image: &RgbImage, width: u32, height: u32, device: Device) -> Tensor {
    let resized;
    let pixels = if image.dimensions() == (width, height) {
        image.as_raw()
    } else {
        resized = imageops::resize(image, width, height, FilterType::Triangle);
        resized.as_raw()
    };

    Tensor::from_slice(pixels)
        .to_device(device)
        .to_kind(Kind::Float)
        .view([1, height as i64, width as i64, 3])
        .permute([0, 3, 1, 2])
        / 255.0
}

/// Run the module and return one prediction row per candidate, laid out as
/// `[x1, y1, x2, y2, score, ...]` in network input coordinates.
pub(crate) fn forward_rows(module: &CModule, input: &Tensor) -> Result<Vec<Vec<f32>>> {
    let output = module.forward_ts(&[input])?;
    let shape = output.size();
    if shape.len() != 3 {
        bail!("unexpected detector output shape: {shape:?}");
    }
    if shape[0] != 1 {
        bail!("detector expected batch=1 but returned {}", shape[0]);
    }

    let preds = output
        .to_device(Device::Cpu)
        .squeeze_dim(0)
        .permute([1, 0])
        .contiguous();
    Ok(Vec::<Vec<f32>>::try_from(&preds)?)
}
