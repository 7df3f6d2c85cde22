//! Balancing weights stored as `bins/<name>`

use super::attributes::{read_attr, write_attr};
use super::dataset::{Dataset, DatasetOptions};
use super::error::{CoolerError, Result};
use hdf5::Group;

/// Attribute flagging weights that must be divided into counts
pub const DIVISIVE_WEIGHTS_ATTR: &str = "divisive_weights";

/// How weights are combined with raw counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeightKind {
    /// `count / (w1 * w2)`
    Divisive,
    /// `count * w1 * w2`
    Multiplicative,
}

impl WeightKind {
    /// Guess the kind from the dataset name
    pub fn infer(name: &str) -> Self {
        match name {
            "weight" | "ICE" => WeightKind::Multiplicative,
            _ => WeightKind::Divisive,
        }
    }

    #[inline]
    pub fn from_flag(divisive: u8) -> Self {
        if divisive != 0 {
            WeightKind::Divisive
        } else {
            WeightKind::Multiplicative
        }
    }

    #[inline]
    pub fn as_flag(self) -> u8 {
        u8::from(self == WeightKind::Divisive)
    }
}

/// One weight per bin
#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    values: Vec<f64>,
    kind: WeightKind,
}

impl Weights {
    pub fn new(values: Vec<f64>, kind: WeightKind) -> Self {
        Self { values, kind }
    }

    /// Weights whose kind is inferred from `name`
    pub fn with_name(values: Vec<f64>, name: &str) -> Self {
        Self::new(values, WeightKind::infer(name))
    }

    #[inline]
    pub fn kind(&self) -> WeightKind {
        self.kind
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Weight of `bin_id`, NaN when out of range
    #[inline]
    pub fn get(&self, bin_id: u64) -> f64 {
        self.values.get(bin_id as usize).copied().unwrap_or(f64::NAN)
    }

    /// Balance one raw count
    #[inline]
    pub fn balance(&self, bin1_id: u64, bin2_id: u64, count: f64) -> f64 {
        let w1 = self.get(bin1_id);
        let w2 = self.get(bin2_id);
        match self.kind {
            WeightKind::Divisive => count / (w1 * w2),
            WeightKind::Multiplicative => count * w1 * w2,
        }
    }
}

/// Read `bins/<name>`.
///
/// The kind comes from the `divisive_weights` attribute when present and is
/// inferred from the name otherwise.
pub fn read_weights(root: &Group, name: &str, nbins: u64) -> Result<Weights> {
    let path = format!("bins/{}", name);
    if name.is_empty() || !root.link_exists(&path) {
        return Err(CoolerError::WeightsNotFound(name.to_string()));
    }
    let dset = Dataset::open(root, &path)?;
    if dset.len() != nbins {
        return Err(CoolerError::WeightsShape {
            expected: nbins,
            found: dset.len(),
        });
    }
    let kind = match read_attr::<u8>(dset.inner(), DIVISIVE_WEIGHTS_ATTR)? {
        Some(flag) => WeightKind::from_flag(flag),
        None => WeightKind::infer(name),
    };
    log::debug!("read {} weights \"{}\" ({:?})", dset.len(), name, kind);
    Ok(Weights::new(dset.read_all::<f64>()?, kind))
}

/// Write `bins/<name>` and tag it with `divisive_weights`
pub fn write_weights(
    root: &Group,
    name: &str,
    values: &[f64],
    kind: WeightKind,
    nbins: u64,
    overwrite: bool,
    opts: &DatasetOptions,
) -> Result<()> {
    if values.len() as u64 != nbins {
        return Err(CoolerError::WeightsShape {
            expected: nbins,
            found: values.len() as u64,
        });
    }
    if name.is_empty() || matches!(name, "chrom" | "start" | "end") {
        return Err(CoolerError::InvalidWeightsName(name.to_string()));
    }

    let path = format!("bins/{}", name);
    if root.link_exists(&path) {
        if !overwrite {
            return Err(CoolerError::PathExists(path));
        }
        root.unlink(&path)?;
    }

    let dset = Dataset::create::<f64>(root, &path, opts)?;
    dset.append(values)?;
    write_attr(dset.inner(), DIVISIVE_WEIGHTS_ATTR, &kind.as_flag())?;
    log::info!("wrote {} weights to \"{}\"", values.len(), path);
    Ok(())
}
