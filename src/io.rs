//! Safetensors I/O for the command-line tools.
//!
//! Recording file (`raw.safetensors`):
//!
//! | key        | dtype | shape  |                               |
//! |------------|-------|--------|-------------------------------|
//! | `data`     | F32   | [C, T] | original units                |
//! | `sfreq`    | F32   | [1]    | Hz                            |
//! | `ch_names` | U8    | [n]    | newline-separated, optional   |
//!
//! Block and prediction files use the same container; see the `preproc` and
//! `stage` binaries for their keys.
use anyhow::{bail, ensure, Context, Result};
use ndarray::{Array, ArrayD, Dimension, IxDyn};
use std::collections::HashMap;
use std::path::Path;

use crate::recording::Recording;

// ── Reader ────────────────────────────────────────────────────────────────────

/// A whole safetensors file held in memory, tensors decoded on request.
pub struct StFile {
    bytes: Vec<u8>,
    header: HashMap<String, serde_json::Value>,
    data_start: usize,
}

impl StFile {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        ensure!(bytes.len() >= 8, "safetensors file too small");
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[..8]);
        let data_start = usize::try_from(u64::from_le_bytes(len))
            .ok()
            .and_then(|n| n.checked_add(8))
            .filter(|&end| end <= bytes.len())
            .context("safetensors header truncated")?;
        let mut header: HashMap<String, serde_json::Value> =
            serde_json::from_slice(&bytes[8..data_start]).context("failed to parse safetensors header")?;
        header.remove("__metadata__");
        Ok(Self { bytes, header, data_start })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.header.contains_key(name)
    }

    /// `(dtype, shape, raw bytes)` of tensor `name`.
    fn entry(&self, name: &str) -> Result<(&str, Vec<usize>, &[u8])> {
        let entry = self.header.get(name).with_context(|| format!("missing '{name}' key"))?;
        let dtype = entry["dtype"].as_str().with_context(|| format!("'{name}' has no dtype"))?;
        let shape = entry["shape"]
            .as_array()
            .with_context(|| format!("'{name}' has no shape"))?
            .iter()
            .map(|v| v.as_u64().map(|d| d as usize).context("non-integer dimension"))
            .collect::<Result<Vec<usize>>>()?;
        let offsets = entry["data_offsets"]
            .as_array()
            .with_context(|| format!("'{name}' has no data_offsets"))?;
        let (s, e) = match offsets.as_slice() {
            [s, e] => (
                s.as_u64().context("bad offset")? as usize,
                e.as_u64().context("bad offset")? as usize,
            ),
            _ => bail!("'{name}' data_offsets must have two entries"),
        };
        let raw = self
            .data_start
            .checked_add(s)
            .zip(self.data_start.checked_add(e))
            .and_then(|(s, e)| self.bytes.get(s..e))
            .with_context(|| format!("'{name}' data out of bounds"))?;
        Ok((dtype, shape, raw))
    }

    /// Tensor `name` as f32 (F32 and F64 accepted).
    pub fn f32(&self, name: &str) -> Result<ArrayD<f32>> {
        let (dtype, shape, raw) = self.entry(name)?;
        let values: Vec<f32> = match dtype {
            "F32" => raw.chunks_exact(4).map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])).collect(),
            "F64" => raw
                .chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
                .collect(),
            other => bail!("'{name}' is {other}, expected F32 or F64"),
        };
        Array::from_shape_vec(IxDyn(&shape), values).with_context(|| format!("'{name}' shape {shape:?}"))
    }

    /// Tensor `name` as a fixed-dimension f32 array.
    pub fn f32_nd<D: Dimension>(&self, name: &str) -> Result<Array<f32, D>> {
        self.f32(name)?
            .into_dimensionality::<D>()
            .with_context(|| format!("'{name}' has the wrong number of dimensions"))
    }

    /// Integer tensor `name` (I32 or I64), flattened.
    pub fn ints(&self, name: &str) -> Result<Vec<i64>> {
        let (dtype, _, raw) = self.entry(name)?;
        Ok(match dtype {
            "I32" => raw.chunks_exact(4).map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as i64).collect(),
            "I64" => raw
                .chunks_exact(8)
                .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect(),
            other => bail!("'{name}' is {other}, expected I32 or I64"),
        })
    }

    /// Non-negative integer tensor `name` as indices.
    pub fn indices(&self, name: &str) -> Result<Vec<usize>> {
        self.ints(name)?
            .into_iter()
            .map(|v| usize::try_from(v).with_context(|| format!("'{name}' holds negative value {v}")))
            .collect()
    }

    /// Single integer stored as a one-element tensor.
    pub fn scalar(&self, name: &str) -> Result<i64> {
        match self.ints(name)?.as_slice() {
            [v] => Ok(*v),
            other => bail!("'{name}' should hold one value, has {}", other.len()),
        }
    }

    /// Non-negative single integer, e.g. an epoch or group count.
    pub fn count(&self, name: &str) -> Result<usize> {
        let v = self.scalar(name)?;
        usize::try_from(v).with_context(|| format!("'{name}' holds negative count {v}"))
    }

    /// Newline-separated UTF-8 strings stored as a U8 tensor.
    pub fn strings(&self, name: &str) -> Result<Vec<String>> {
        let (_, _, raw) = self.entry(name)?;
        let text = std::str::from_utf8(raw).with_context(|| format!("'{name}' is not UTF-8"))?;
        Ok(text.split('\n').filter(|s| !s.is_empty()).map(String::from).collect())
    }
}

/// Load a recording file (`data`, `sfreq`, optional `ch_names`).
pub fn load_recording(path: &Path) -> Result<Recording> {
    let st = StFile::open(path)?;
    let data = st.f32_nd::<ndarray::Ix2>("data")?;
    let sfreq = *st.f32("sfreq")?.iter().next().context("empty 'sfreq'")?;
    let ch_names = if st.contains("ch_names") { Some(st.strings("ch_names")?) } else { None };
    Ok(Recording::new(data, sfreq, ch_names)?)
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Simple safetensors file writer for F32, I32 and U8 tensors.
///
/// ```rust,no_run
/// use hypnos::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f32("signal", &[1.0f32, 2.0, 3.0], &[1, 3]);
/// w.add_i32("starts", &[0, 17], &[2]);
/// w.add_strings("names", &["C3-A2".to_string()]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    /// Any-dimension f32 array, written in logical (row-major) order.
    pub fn add_f32_array<D: Dimension>(&mut self, name: &str, arr: &Array<f32, D>) {
        let data: Vec<f32> = arr.iter().copied().collect();
        self.add_f32(name, &data, arr.shape());
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    /// Index list stored as I32.
    pub fn add_indices(&mut self, name: &str, values: &[usize]) -> Result<()> {
        let data = values
            .iter()
            .map(|&v| i32::try_from(v).with_context(|| format!("'{name}' value {v} overflows i32")))
            .collect::<Result<Vec<i32>>>()?;
        self.add_i32(name, &data, &[data.len()]);
        Ok(())
    }

    pub fn add_scalar(&mut self, name: &str, value: i32) {
        self.add_i32(name, &[value], &[1]);
    }

    /// Newline-joined strings as a U8 tensor.
    pub fn add_strings(&mut self, name: &str, values: &[String]) {
        let bytes = values.join("\n").into_bytes();
        let len = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![len]));
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), serde_json::json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;

        let mut out = Vec::with_capacity(8 + hdr_bytes.len() + pad + offset);
        out.extend_from_slice(&((hdr_bytes.len() + pad) as u64).to_le_bytes());
        out.extend_from_slice(&hdr_bytes);
        out.extend(std::iter::repeat(b' ').take(pad));
        for (_, data, _, _) in &self.entries {
            out.extend_from_slice(data);
        }
        Ok(out)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?).with_context(|| format!("writing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array4, Ix4};

    #[test]
    fn writer_output_reads_back() {
        let blocks = Array4::from_shape_fn((2, 3, 4, 1), |(b, e, s, _)| (b * 100 + e * 10 + s) as f32);
        let mut w = StWriter::new();
        w.add_f32_array("blocks", &blocks);
        w.add_indices("starts", &[0, 17]).unwrap();
        w.add_scalar("n_raw_epochs", 50);
        w.add_strings("names", &["C3-A2".to_string(), "EOG-L".to_string()]);

        let st = StFile::from_bytes(w.to_bytes().unwrap()).unwrap();
        assert_eq!(st.f32_nd::<Ix4>("blocks").unwrap(), blocks);
        assert_eq!(st.indices("starts").unwrap(), vec![0, 17]);
        assert_eq!(st.scalar("n_raw_epochs").unwrap(), 50);
        assert_eq!(st.strings("names").unwrap(), vec!["C3-A2", "EOG-L"]);
        assert!(!st.contains("missing"));
        assert!(st.f32("missing").is_err());
    }

    #[test]
    fn recording_file() {
        let data = Array2::from_shape_fn((2, 5), |(c, t)| (c * 10 + t) as f32);
        let mut w = StWriter::new();
        w.add_f32_array("data", &data);
        w.add_f32("sfreq", &[256.0], &[1]);
        let path = std::env::temp_dir().join(format!("hypnos_io_{}.safetensors", std::process::id()));
        w.write(&path).unwrap();
        let rec = load_recording(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(rec.data, data);
        assert_eq!(rec.sfreq, 256.0);
        assert_eq!(rec.ch_names, vec!["Ch01", "Ch02"]);
    }

    #[test]
    fn rejects_truncated() {
        assert!(StFile::from_bytes(vec![1, 2, 3]).is_err());
        assert!(StFile::from_bytes(vec![255, 0, 0, 0, 0, 0, 0, 0, b'{']).is_err());
        assert!(StFile::from_bytes(vec![0xff; 16]).is_err());
    }

    #[test]
    fn negative_count_rejected() {
        let mut w = StWriter::new();
        w.add_scalar("n_groups", -1);
        w.add_scalar("n_epochs", 120);
        let st = StFile::from_bytes(w.to_bytes().unwrap()).unwrap();
        assert!(st.count("n_groups").is_err());
        assert_eq!(st.count("n_epochs").unwrap(), 120);
    }
}
