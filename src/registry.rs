//! 타입 문자열 → 레이어 생성자
//!
//! 전역 등록 없이 파이프라인이 직접 레지스트리를 만들어 들고 다닙니다.

use std::collections::HashMap;

use crate::config::LayerParameter;
use crate::error::{LossError, Result};
use crate::layers::co_loss::{self, COLossLayer};
use crate::layers::LossLayer;

pub type Creator = fn(&LayerParameter) -> Result<Box<dyn LossLayer>>;

#[derive(Default)]
pub struct LayerRegistry {
    creators: HashMap<String, Creator>,
}

fn create_co_loss(param: &LayerParameter) -> Result<Box<dyn LossLayer>> {
    Ok(Box::new(COLossLayer::from_param(param)?))
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 기본 레이어가 등록된 레지스트리
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(co_loss::LAYER_TYPE, create_co_loss);
        registry
    }

    pub fn register(&mut self, layer_type: &str, creator: Creator) {
        self.creators.insert(layer_type.to_string(), creator);
    }

    pub fn contains(&self, layer_type: &str) -> bool {
        self.creators.contains_key(layer_type)
    }

    pub fn create(&self, param: &LayerParameter) -> Result<Box<dyn LossLayer>> {
        let creator = self
            .creators
            .get(&param.layer_type)
            .ok_or_else(|| LossError::UnknownLayerType(param.layer_type.clone()))?;
        creator(param)
    }

    pub fn create_from_json(&self, text: &str) -> Result<Box<dyn LossLayer>> {
        self.create(&LayerParameter::from_json(text)?)
    }
}
