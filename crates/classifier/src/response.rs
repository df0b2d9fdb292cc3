use crate::error::ClassifierError;
use crate::ranking::RankedPrediction;
use serde::Serialize;
use std::io::{self, Write};

pub const DISCLAIMER: &str = "Hasil prediksi hanya untuk referensi. Silakan konsultasi dengan dokter untuk diagnosis yang akurat.";

/// The single JSON document written to stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InferenceResult {
    Success(SuccessPayload),
    Failure(FailurePayload),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessPayload {
    success: bool,
    pub top_3_predictions: Vec<RankedPrediction>,
    pub performance: Performance,
    pub warning: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Performance {
    /// Seconds from accepting the argument to formatting the result.
    pub processing_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailurePayload {
    success: bool,
    pub error: String,
}

pub fn format_success(predictions: Vec<RankedPrediction>, elapsed_seconds: f64) -> InferenceResult {
    InferenceResult::Success(SuccessPayload {
        success: true,
        top_3_predictions: predictions,
        performance: Performance {
            processing_time: elapsed_seconds,
        },
        warning: DISCLAIMER,
    })
}

pub fn format_failure(error: &ClassifierError) -> InferenceResult {
    InferenceResult::Failure(FailurePayload {
        success: false,
        error: error.to_string(),
    })
}

impl InferenceResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InferenceResult::Success(_))
    }

    pub fn exit_status(&self) -> u8 {
        if self.is_success() { 0 } else { 1 }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// One compact JSON line. serde_json leaves non-ASCII text unescaped.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        serde_json::to_writer(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }

    /// Print to stdout and return the process exit status. A result that
    /// cannot be written is reported as a failure.
    pub fn emit(&self) -> u8 {
        match self.write_to(io::stdout().lock()) {
            Ok(()) => self.exit_status(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to write result to stdout");
                1
            }
        }
    }
}
