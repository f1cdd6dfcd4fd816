//! 레이어 이름을 키로 하는 파라미터 스냅샷 (JSON)

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{LossError, Result};
use crate::layers::LossLayer;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub layers: BTreeMap<String, Vec<Array2<f32>>>,
}

impl Checkpoint {
    pub fn capture(layers: &[&dyn LossLayer]) -> Result<Self> {
        let mut checkpoint = Self::default();
        for &layer in layers {
            checkpoint.insert(layer)?;
        }
        Ok(checkpoint)
    }

    pub fn insert(&mut self, layer: &dyn LossLayer) -> Result<()> {
        self.layers
            .insert(layer.name().to_string(), layer.export_params()?);
        Ok(())
    }

    /// 이름이 같은 항목을 레이어에 넣습니다. setup 전에 부르면 warm start 가 됩니다.
    pub fn restore(&self, layer: &mut dyn LossLayer) -> Result<()> {
        let params = self.layers.get(layer.name()).ok_or_else(|| {
            LossError::Checkpoint(format!("no entry for layer '{}'", layer.name()))
        })?;
        layer.import_params(params.clone())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
