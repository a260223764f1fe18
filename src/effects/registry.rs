// SPDX-License-Identifier: GPL-3.0-only

//! Selectable effect table
//!
//! Every entry pairs an [`EffectDescriptor`] (name plus a fixed parameter
//! tuple) with a constructor that turns those parameters into an
//! [`EffectChain`]. Entries are dry-run when they are registered, so a bad
//! parameter tuple is caught while the table is built and never at switch
//! time.

use tracing::debug;

use super::library::{
    Antique, AutoEnhance, Cartoon, Grayscale, Lomo, LomoStyle, LomoVignetting, MagicPen, Sepia,
    Sharpness, Stamp,
};
use super::{EffectChain, InvertedGrayscale};
use crate::errors::ConfigurationError;

/// Identifies a selectable effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectId {
    Lomo,
    MagicPen,
    Grayscale,
    Antique,
    Stamp,
    Cartoon,
    Sepia,
    Sharpness,
    AutoEnhance,
    NoFilter,
    InvertedGrayscale,
}

/// One positional effect parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Tag(&'static str),
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Tag(v) => write!(f, "{}", v),
        }
    }
}

/// Describes one entry of the selectable effect list
#[derive(Debug, Clone, PartialEq)]
pub struct EffectDescriptor {
    pub id: EffectId,
    pub name: String,
    pub parameters: Vec<ParamValue>,
    pub is_custom: bool,
}

impl EffectDescriptor {
    pub fn new(id: EffectId, name: impl Into<String>, parameters: Vec<ParamValue>) -> Self {
        Self {
            id,
            name: name.into(),
            parameters,
            is_custom: false,
        }
    }

    pub fn custom(mut self) -> Self {
        self.is_custom = true;
        self
    }
}

type Constructor = Box<dyn Fn(&[ParamValue]) -> Result<EffectChain, ConfigurationError> + Send + Sync>;

struct Entry {
    descriptor: EffectDescriptor,
    construct: Constructor,
}

/// Ordered table of selectable effects
pub struct EffectRegistry {
    entries: Vec<Entry>,
}

impl EffectRegistry {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The stock effect list
    ///
    /// Order is fixed: persisted selection indexes depend on it.
    pub fn standard() -> Result<Self, ConfigurationError> {
        use ParamValue::{Bool, Float, Int, Tag};

        let mut registry = Self::empty();
        registry.register(
            EffectDescriptor::new(
                EffectId::Lomo,
                "Lomo",
                vec![Float(0.5), Float(0.5), Tag("High"), Tag("Yellow")],
            ),
            |p| {
                let vignetting = LomoVignetting::from_tag(tag(p, 2, "Lomo")?)
                    .ok_or_else(|| invalid("Lomo", "unknown vignetting"))?;
                let style = LomoStyle::from_tag(tag(p, 3, "Lomo")?)
                    .ok_or_else(|| invalid("Lomo", "unknown style"))?;
                Ok(EffectChain::single(Lomo::new(
                    float(p, 0, "Lomo")?,
                    float(p, 1, "Lomo")?,
                    vignetting,
                    style,
                )?))
            },
        )?;
        registry.register(EffectDescriptor::new(EffectId::MagicPen, "MagicPen", vec![]), |_| {
            Ok(EffectChain::single(MagicPen::new()))
        })?;
        registry.register(EffectDescriptor::new(EffectId::Grayscale, "Grayscale", vec![]), |_| {
            Ok(EffectChain::single(Grayscale))
        })?;
        registry.register(EffectDescriptor::new(EffectId::Antique, "Antique", vec![]), |_| {
            Ok(EffectChain::single(Antique))
        })?;
        registry.register(
            EffectDescriptor::new(EffectId::Stamp, "Stamp", vec![Int(4), Float(0.3)]),
            |p| {
                Ok(EffectChain::single(Stamp::new(
                    int(p, 0, "Stamp")?,
                    float(p, 1, "Stamp")?,
                )?))
            },
        )?;
        registry.register(
            EffectDescriptor::new(EffectId::Cartoon, "Cartoon", vec![Bool(false)]),
            |p| Ok(EffectChain::single(Cartoon::new(boolean(p, 0, "Cartoon")?))),
        )?;
        registry.register(EffectDescriptor::new(EffectId::Sepia, "Sepia", vec![]), |_| {
            Ok(EffectChain::single(Sepia))
        })?;
        registry.register(
            EffectDescriptor::new(EffectId::Sharpness, "Sharpness", vec![Int(7)]),
            |p| Ok(EffectChain::single(Sharpness::new(int(p, 0, "Sharpness")?)?)),
        )?;
        registry.register(
            EffectDescriptor::new(EffectId::AutoEnhance, "AutoEnhance", vec![]),
            |_| Ok(EffectChain::single(AutoEnhance::new())),
        )?;
        registry.register(EffectDescriptor::new(EffectId::NoFilter, "No filter", vec![]), |_| {
            Ok(EffectChain::identity())
        })?;
        registry.register(
            EffectDescriptor::new(EffectId::InvertedGrayscale, "Inverted grayscale", vec![]).custom(),
            |_| Ok(EffectChain::single(InvertedGrayscale::new())),
        )?;

        Ok(registry)
    }

    /// Add an effect to the end of the list
    ///
    /// The constructor is run once with the descriptor's parameters; an
    /// entry that cannot be built is rejected.
    pub fn register<F>(&mut self, descriptor: EffectDescriptor, construct: F) -> Result<usize, ConfigurationError>
    where
        F: Fn(&[ParamValue]) -> Result<EffectChain, ConfigurationError> + Send + Sync + 'static,
    {
        if self.entries.iter().any(|e| e.descriptor.name == descriptor.name) {
            return Err(invalid(&descriptor.name, "registered twice"));
        }

        let chain = construct(&descriptor.parameters)?;
        debug!(
            name = %descriptor.name,
            stages = ?chain.stage_names(),
            "Registered effect"
        );

        self.entries.push(Entry {
            descriptor,
            construct: Box::new(construct),
        });
        Ok(self.entries.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn descriptor(&self, index: usize) -> Option<&EffectDescriptor> {
        self.entries.get(index).map(|e| &e.descriptor)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &EffectDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// Index of the effect called `name`
    pub fn find(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.descriptor.name.eq_ignore_ascii_case(name))
    }

    /// Build a fresh chain for the effect at `index`
    pub fn build(&self, index: usize) -> Result<EffectChain, ConfigurationError> {
        let entry = self.entries.get(index).ok_or_else(|| {
            invalid(
                &index.to_string(),
                format!("index outside 0..{}", self.entries.len()),
            )
        })?;
        (entry.construct)(&entry.descriptor.parameters)
    }

    /// Display label, "3/11 - Grayscale"
    pub fn label(&self, index: usize) -> Option<String> {
        self.descriptor(index)
            .map(|d| format!("{}/{} - {}", index + 1, self.entries.len(), d.name))
    }
}

impl std::fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.descriptors()).finish()
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidEffect {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn param<'a>(params: &'a [ParamValue], index: usize, name: &str) -> Result<&'a ParamValue, ConfigurationError> {
    params
        .get(index)
        .ok_or_else(|| invalid(name, format!("missing parameter {}", index)))
}

fn float(params: &[ParamValue], index: usize, name: &str) -> Result<f64, ConfigurationError> {
    match param(params, index, name)? {
        ParamValue::Float(v) => Ok(*v),
        ParamValue::Int(v) => Ok(*v as f64),
        other => Err(invalid(name, format!("parameter {} is {:?}, expected a number", index, other))),
    }
}

fn int(params: &[ParamValue], index: usize, name: &str) -> Result<i64, ConfigurationError> {
    match param(params, index, name)? {
        ParamValue::Int(v) => Ok(*v),
        other => Err(invalid(name, format!("parameter {} is {:?}, expected an integer", index, other))),
    }
}

fn boolean(params: &[ParamValue], index: usize, name: &str) -> Result<bool, ConfigurationError> {
    match param(params, index, name)? {
        ParamValue::Bool(v) => Ok(*v),
        other => Err(invalid(name, format!("parameter {} is {:?}, expected a bool", index, other))),
    }
}

fn tag<'a>(params: &'a [ParamValue], index: usize, name: &str) -> Result<&'a str, ConfigurationError> {
    match param(params, index, name)? {
        ParamValue::Tag(v) => Ok(*v),
        other => Err(invalid(name, format!("parameter {} is {:?}, expected a tag", index, other))),
    }
}
