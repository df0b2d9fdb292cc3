use serde::Serialize;
use std::fmt;

pub const FALLBACK_EXPLANATION: &str = "Tidak ada penjelasan tersedia";

/// The seven lesion categories, in the order of the model's output vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LesionClass {
    Akiec,
    Bcc,
    Bkl,
    Df,
    Mel,
    Nv,
    Vasc,
}

impl LesionClass {
    pub const ALL: [LesionClass; 7] = [
        LesionClass::Akiec,
        LesionClass::Bcc,
        LesionClass::Bkl,
        LesionClass::Df,
        LesionClass::Mel,
        LesionClass::Nv,
        LesionClass::Vasc,
    ];

    pub fn code(self) -> &'static str {
        match self {
            LesionClass::Akiec => "akiec",
            LesionClass::Bcc => "bcc",
            LesionClass::Bkl => "bkl",
            LesionClass::Df => "df",
            LesionClass::Mel => "mel",
            LesionClass::Nv => "nv",
            LesionClass::Vasc => "vasc",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.code() == code)
    }

    /// Description shown to the user, in Indonesian like the rest of the
    /// client-facing text.
    pub fn explanation(self) -> &'static str {
        match self {
            LesionClass::Akiec => {
                "Actinic Keratosis - Lesi pra-kanker yang muncul sebagai bercak kasar dan bersisik"
            }
            LesionClass::Bcc => {
                "Basal Cell Carcinoma - Kanker kulit yang muncul sebagai benjolan mengkilap atau luka yang tidak sembuh"
            }
            LesionClass::Bkl => {
                "Benign Keratosis - Pertumbuhan jinak yang muncul sebagai bercak coklat dengan permukaan berminyak"
            }
            LesionClass::Df => {
                "Dermatofibroma - Benjolan keras dan jinak dengan warna coklat hingga kemerahan"
            }
            LesionClass::Mel => {
                "Melanoma - Kanker kulit yang berbahaya, sering muncul sebagai tahi lalat yang berubah atau tidak teratur"
            }
            LesionClass::Nv => {
                "Melanocytic Nevus - Tahi lalat jinak dengan warna dan bentuk yang teratur"
            }
            LesionClass::Vasc => {
                "Vascular Lesion - Kelainan pembuluh darah yang muncul sebagai bercak merah atau ungu"
            }
        }
    }
}

impl fmt::Display for LesionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Description for a class code; unknown codes get the fallback text.
pub fn explain(code: &str) -> &'static str {
    match LesionClass::from_code(code) {
        Some(class) => class.explanation(),
        None => {
            tracing::warn!(code, "No catalog entry for class code");
            FALLBACK_EXPLANATION
        }
    }
}
