//! Azure neural voices for the supported Indian languages.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Female => write!(f, "Female"),
            Gender::Male => write!(f, "Male"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown gender '{0}', expected 'Female' or 'Male'")]
pub struct UnknownGender(pub String);

impl FromStr for Gender {
    type Err = UnknownGender;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "female" => Ok(Gender::Female),
            "male" => Ok(Gender::Male),
            _ => Err(UnknownGender(s.to_string())),
        }
    }
}

/// (language, female voice, male voice)
const VOICES: &[(&str, &str, &str)] = &[
    ("Assamese", "as-IN-YashicaNeural", "as-IN-PriyomNeural"),
    ("Bengali", "bn-IN-TanishaaNeural", "bn-IN-BashkarNeural"),
    ("Gujarati", "gu-IN-DhwaniNeural", "gu-IN-NiranjanNeural"),
    ("Hindi", "hi-IN-AnanyaNeural", "hi-IN-AaravNeural"),
    ("Kannada", "kn-IN-SapnaNeural", "kn-IN-GaganNeural"),
    ("Malayalam", "ml-IN-SobhanaNeural", "ml-IN-MidhunNeural"),
    ("Marathi", "mr-IN-AarohiNeural", "mr-IN-ManoharNeural"),
    ("Oriya", "or-IN-SubhasiniNeural", "or-IN-SukantNeural"),
    ("Punjabi", "pa-IN-VaaniNeural", "pa-IN-OjasNeural"),
    ("Tamil", "ta-IN-PallaviNeural", "ta-IN-ValluvarNeural"),
    ("Telugu", "te-IN-ShrutiNeural", "te-IN-MohanNeural"),
    ("Urdu", "ur-IN-GulNeural", "ur-IN-SalmanNeural"),
    ("English", "en-IN-AashiNeural", "en-IN-AaravNeural"),
];

/// Looks up the voice for a language name. Matching ignores ASCII case.
pub fn neural_voice(language: &str, gender: Gender) -> Option<&'static str> {
    VOICES
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(language.trim()))
        .map(|(_, female, male)| match gender {
            Gender::Female => *female,
            Gender::Male => *male,
        })
}

pub fn supported_languages() -> impl Iterator<Item = &'static str> {
    VOICES.iter().map(|(name, _, _)| *name)
}

/// The `xml:lang` locale of a voice, e.g. `hi-IN` for `hi-IN-AnanyaNeural`.
pub fn voice_locale(voice: &str) -> &str {
    match voice.match_indices('-').nth(1) {
        Some((idx, _)) => &voice[..idx],
        None => voice,
    }
}
