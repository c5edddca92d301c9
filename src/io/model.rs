// SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later

//! Binary model file (spec.md §6, SPEC_FULL.md §4.L): a fixed magic +
//! version header followed by four length-prefixed, little-endian chunks —
//! the active-feature table, the label string table, the attribute string
//! table, and the attribute→feature index.
//!
//! Hand-framed the way the teacher codes its own binary formats (`bvgraph`'s
//! offset/degree streams): no `serde`/`bincode` on the hot path, only a
//! small metadata struct behind the optional `serde` feature for the `dump`
//! command's JSON output.

use std::io::{Read, Write};

use crate::dictionary::FrozenDictionary;
use crate::error::{Error, Result};
use crate::feature::{AttributeIndex, FeatureTable};
use crate::types::Feature;

const MAGIC: &[u8; 4] = b"VOCF";
const VERSION: u32 = 1;

/// Small JSON-friendly summary of a model file, independent of the binary
/// chunks, for the `dump` CLI command.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModelHeader {
    pub version: u32,
    pub num_features: u32,
    pub num_labels: u32,
    pub num_attrs: u32,
}

fn write_u32<W: Write>(w: &mut W, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())
        .map_err(|_| Error::OutOfMemory { what: "model file write" })
}

fn write_f64<W: Write>(w: &mut W, v: f64) -> Result<()> {
    w.write_all(&v.to_le_bytes())
        .map_err(|_| Error::OutOfMemory { what: "model file write" })
}

fn write_string<W: Write>(w: &mut W, s: &str) -> Result<()> {
    write_u32(w, s.len() as u32)?;
    w.write_all(s.as_bytes())
        .map_err(|_| Error::OutOfMemory { what: "model file write" })
}

fn read_u32<R: Read>(r: &mut R, path: &std::path::Path) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)
        .map_err(|e| Error::InvalidModel { path: path.to_path_buf(), reason: e.to_string() })?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f64<R: Read>(r: &mut R, path: &std::path::Path) -> Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)
        .map_err(|e| Error::InvalidModel { path: path.to_path_buf(), reason: e.to_string() })?;
    Ok(f64::from_le_bytes(buf))
}

fn read_string<R: Read>(r: &mut R, path: &std::path::Path) -> Result<String> {
    let len = read_u32(r, path)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)
        .map_err(|e| Error::InvalidModel { path: path.to_path_buf(), reason: e.to_string() })?;
    String::from_utf8(buf).map_err(|e| Error::InvalidModel {
        path: path.to_path_buf(),
        reason: format!("non-utf8 string: {e}"),
    })
}

/// Writes a trained model. Zero-weight features are pruned first, and the
/// attribute→feature index is rebuilt against the surviving, densely
/// renumbered feature ids.
pub fn write_model<W: Write>(
    w: &mut W,
    features: FeatureTable,
    labels: &FrozenDictionary,
    attrs: &FrozenDictionary,
) -> Result<()> {
    let (features, _remap) = features.prune_zero_weight();
    let attr_index = AttributeIndex::build(attrs.num(), &features);

    w.write_all(MAGIC).map_err(|_| Error::OutOfMemory { what: "model file write" })?;
    write_u32(w, VERSION)?;

    // (i) active-feature table
    write_u32(w, features.len() as u32)?;
    for (_, f) in features.iter() {
        write_u32(w, f.order() as u32)?;
        write_u32(w, f.attr_id)?;
        for &l in &f.label_sequence {
            write_u32(w, l)?;
        }
        write_f64(w, f.weight)?;
    }

    // (ii) label string table
    write_u32(w, labels.num() as u32)?;
    for s in labels.strings() {
        write_string(w, s)?;
    }

    // (iii) attribute string table
    write_u32(w, attrs.num() as u32)?;
    for s in attrs.strings() {
        write_string(w, s)?;
    }

    // (iv) attribute -> feature index
    for attr_id in 0..attrs.num() as u32 {
        let fids = attr_index.features_for(attr_id);
        write_u32(w, fids.len() as u32)?;
        for &fid in fids {
            write_u32(w, fid)?;
        }
    }

    Ok(())
}

/// A fully loaded model: the pruned feature table, the frozen label/attr
/// dictionaries, and the rebuilt attribute→feature index.
pub struct LoadedModel {
    pub features: FeatureTable,
    pub labels: FrozenDictionary,
    pub attrs: FrozenDictionary,
    pub attr_index: AttributeIndex,
}

pub fn read_model<R: Read>(r: &mut R, path: &std::path::Path) -> Result<LoadedModel> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)
        .map_err(|e| Error::InvalidModel { path: path.to_path_buf(), reason: e.to_string() })?;
    if &magic != MAGIC {
        return Err(Error::InvalidModel {
            path: path.to_path_buf(),
            reason: "bad magic".to_string(),
        });
    }
    let version = read_u32(r, path)?;
    if version != VERSION {
        return Err(Error::Incompatible { found: version, expected: VERSION });
    }

    let num_features = read_u32(r, path)?;
    let mut features = FeatureTable::new();
    for _ in 0..num_features {
        let order = read_u32(r, path)? as usize;
        let attr_id = read_u32(r, path)?;
        let mut label_sequence = Vec::with_capacity(order);
        for _ in 0..order {
            label_sequence.push(read_u32(r, path)?);
        }
        let weight = read_f64(r, path)?;
        let mut f = Feature::new(attr_id, label_sequence);
        f.weight = weight;
        features.push(f);
    }

    let num_labels = read_u32(r, path)?;
    let mut label_strings = Vec::with_capacity(num_labels as usize);
    for _ in 0..num_labels {
        label_strings.push(read_string(r, path)?);
    }
    let labels = FrozenDictionary::from_strings(label_strings);

    let num_attrs = read_u32(r, path)?;
    let mut attr_strings = Vec::with_capacity(num_attrs as usize);
    for _ in 0..num_attrs {
        attr_strings.push(read_string(r, path)?);
    }
    let attrs = FrozenDictionary::from_strings(attr_strings);

    // The stored attribute->feature index is redundant with the feature
    // table's own attr_id fields; rebuild it rather than trust the file, but
    // still consume the bytes so further reads on `r` (if any) stay aligned.
    for _ in 0..num_attrs {
        let count = read_u32(r, path)?;
        for _ in 0..count {
            read_u32(r, path)?;
        }
    }
    let attr_index = AttributeIndex::build(attrs.num(), &features);

    Ok(LoadedModel { features, labels, attrs, attr_index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::MutableDictionary;

    #[test]
    fn round_trips_a_small_model() {
        let mut labels = MutableDictionary::new();
        let mut attrs = MutableDictionary::new();
        labels.get("A");
        labels.get("B");
        attrs.get("word");

        let mut features = FeatureTable::new();
        let mut f0 = Feature::new(0, vec![0]);
        f0.weight = 1.5;
        features.push(f0);
        let mut f1 = Feature::new(0, vec![1]); // zero weight, must be pruned
        f1.weight = 0.0;
        features.push(f1);

        let mut buf = Vec::new();
        write_model(&mut buf, features, &labels.clone().freeze(), &attrs.clone().freeze()).unwrap();

        let loaded = read_model(&mut buf.as_slice(), std::path::Path::new("<mem>")).unwrap();
        assert_eq!(loaded.features.len(), 1);
        assert_eq!(loaded.features.get(0).weight, 1.5);
        assert_eq!(loaded.labels.num(), 2);
        assert_eq!(loaded.attrs.num(), 1);
    }

    #[test]
    fn rejects_bad_magic() {
        let buf = vec![0u8; 16];
        let err = read_model(&mut buf.as_slice(), std::path::Path::new("<mem>")).unwrap_err();
        assert!(matches!(err, Error::InvalidModel { .. }));
    }
}
