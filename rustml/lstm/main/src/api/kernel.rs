//! Kernel variant selection.
//!
//! A cell is configured once with a [`KernelVariant`] describing its
//! (input type, accumulator type, unsigned activation) triple. The hot loops
//! never branch on element type; the variant is resolved when the cell is built.

use crate::api::error::{LstmError, LstmResult};
use serde::{Deserialize, Serialize};

/// Element types appearing in kernel signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    F32,
    I32,
    I16,
    I8,
}

impl std::fmt::Display for ElementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementType::F32 => write!(f, "f32"),
            ElementType::I32 => write!(f, "i32"),
            ElementType::I16 => write!(f, "i16"),
            ElementType::I8 => write!(f, "i8"),
        }
    }
}

/// The closed set of kernel variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KernelVariant {
    /// f32 inputs, f32 accumulation
    #[default]
    #[serde(rename = "f32")]
    F32,
    /// i16 inputs, i32 accumulation
    #[serde(rename = "i16_i32")]
    I16I32,
    /// unsigned i8 activations, i16 accumulation
    #[serde(rename = "i8_i16_unsigned")]
    I8I16Unsigned,
    /// unsigned i8 activations, i32 accumulation
    #[serde(rename = "i8_i32_unsigned")]
    I8I32Unsigned,
}

impl KernelVariant {
    /// Resolves the variant for an (input, accumulator, unsigned activation) triple.
    ///
    /// 8-bit inputs are only defined for unsigned activations.
    pub fn select(
        input: ElementType,
        accumulator: ElementType,
        unsigned_activation: bool,
    ) -> LstmResult<Self> {
        match (input, accumulator, unsigned_activation) {
            (ElementType::F32, ElementType::F32, _) => Ok(KernelVariant::F32),
            (ElementType::I16, ElementType::I32, _) => Ok(KernelVariant::I16I32),
            (ElementType::I8, ElementType::I16, true) => Ok(KernelVariant::I8I16Unsigned),
            (ElementType::I8, ElementType::I32, true) => Ok(KernelVariant::I8I32Unsigned),
            (i, a, u) => Err(LstmError::UnsupportedKernel(format!(
                "no kernel for input={} accumulator={} unsigned_activation={}",
                i, a, u
            ))),
        }
    }

    pub fn input_type(self) -> ElementType {
        match self {
            KernelVariant::F32 => ElementType::F32,
            KernelVariant::I16I32 => ElementType::I16,
            KernelVariant::I8I16Unsigned | KernelVariant::I8I32Unsigned => ElementType::I8,
        }
    }

    pub fn accumulator_type(self) -> ElementType {
        match self {
            KernelVariant::F32 => ElementType::F32,
            KernelVariant::I16I32 | KernelVariant::I8I32Unsigned => ElementType::I32,
            KernelVariant::I8I16Unsigned => ElementType::I16,
        }
    }

    pub fn unsigned_activation(self) -> bool {
        matches!(self, KernelVariant::I8I16Unsigned | KernelVariant::I8I32Unsigned)
    }

    /// Whether the reference cell implements this variant.
    ///
    /// Only the single-precision path is modeled.
    pub fn is_reference_supported(self) -> bool {
        self == KernelVariant::F32
    }
}

impl std::fmt::Display for KernelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.input_type(), self.accumulator_type())?;
        if self.unsigned_activation() {
            write!(f, " (unsigned)")?;
        }
        Ok(())
    }
}
