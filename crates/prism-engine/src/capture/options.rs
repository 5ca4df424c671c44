use serde_json::Value;

use crate::error::ConfigurationError;

/// How captured pixels are handed back.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum CaptureFormat {
    /// A `data:` URL with base64 payload.
    #[default]
    Base64,
    /// Raw encoded bytes.
    Blob,
}

/// Options of one capture request.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    pub format: CaptureFormat,
    /// Image type, e.g. `png` or `jpeg` (an `image/` prefix is accepted).
    pub mime: String,
    /// Encoder quality in `[0, 1]`; used by lossy types.
    pub quality: f32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            format: CaptureFormat::Base64,
            mime: "png".into(),
            quality: 1.0,
        }
    }
}

/// Identity under which identical requests are merged.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct CaptureKey {
    format: CaptureFormat,
    mime: String,
    quality_bits: u32,
}

const KNOWN_KEYS: [&str; 3] = ["format", "type", "quality"];

impl CaptureOptions {
    pub fn with_format(mut self, format: CaptureFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = mime.into();
        self
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.mime.trim().is_empty() {
            return Err(ConfigurationError::InvalidType(format!("{:?}", self.mime)));
        }
        if !(0.0..=1.0).contains(&self.quality) {
            return Err(ConfigurationError::InvalidQuality(self.quality.to_string()));
        }
        Ok(())
    }

    pub fn key(&self) -> CaptureKey {
        // -0.0 and 0.0 name the same request.
        let quality = if self.quality == 0.0 { 0.0 } else { self.quality };
        CaptureKey {
            format: self.format,
            mime: self.mime.clone(),
            quality_bits: quality.to_bits(),
        }
    }

    /// Parses `{format, type, quality}` with defaults for absent keys.
    ///
    /// `null` yields the defaults.
    pub fn from_json(value: &Value) -> Result<Self, ConfigurationError> {
        let mut options = Self::default();
        let map = match value {
            Value::Null => return Ok(options),
            Value::Object(map) => map,
            other => return Err(ConfigurationError::NotAnObject(other.to_string())),
        };

        let unknown: Vec<String> = map
            .keys()
            .filter(|k| !KNOWN_KEYS.contains(&k.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(ConfigurationError::UnknownKeys(unknown));
        }

        if let Some(format) = map.get("format") {
            options.format = match format.as_str() {
                Some("base64") => CaptureFormat::Base64,
                Some("blob") => CaptureFormat::Blob,
                _ => return Err(ConfigurationError::InvalidFormat(format.to_string())),
            };
        }
        if let Some(ty) = map.get("type") {
            match ty.as_str() {
                Some(s) if !s.trim().is_empty() => options.mime = s.to_string(),
                _ => return Err(ConfigurationError::InvalidType(ty.to_string())),
            }
        }
        if let Some(quality) = map.get("quality") {
            let q = quality
                .as_f64()
                .filter(|q| (0.0..=1.0).contains(q))
                .ok_or_else(|| ConfigurationError::InvalidQuality(quality.to_string()))?;
            options.quality = q as f32;
        }

        options.validate()?;
        Ok(options)
    }
}
