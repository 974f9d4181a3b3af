//! Settings to filter-graph compilation.

use super::error::TransformError;
use super::types::{AudioStage, FilterGraph, TargetPlatform, VideoStage};
use crate::preset::ModificationSettings;

/// Sample rate the pitch stage resamples back to.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

const SPEED_DOMAIN: (f64, f64) = (0.5, 2.0);
const PERCENT_DOMAIN: (f64, f64) = (-100.0, 100.0);
const ROTATION_DOMAIN: (f64, f64) = (-360.0, 360.0);
const NOISE_DOMAIN: (f64, f64) = (0.0, 100.0);

/// Compiles [`ModificationSettings`] into an ordered [`FilterGraph`].
///
/// Compilation is pure: identical input always yields the identical graph.
/// Stages whose parameter is a no-op are left out.
#[derive(Debug, Clone, Copy)]
pub struct TransformCompiler {
    sample_rate: u32,
}

impl Default for TransformCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl TransformCompiler {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn compile(
        &self,
        settings: &ModificationSettings,
        platform: TargetPlatform,
    ) -> Result<FilterGraph, TransformError> {
        validate_settings(settings)?;

        let mut video = Vec::new();
        if settings.speed != 1.0 {
            video.push(VideoStage::TimeRemap {
                speed: settings.speed,
            });
        }
        if settings.brightness != 0.0 {
            video.push(VideoStage::Brightness {
                value: settings.brightness / 100.0,
            });
        }
        if settings.saturation != 0.0 {
            video.push(VideoStage::Saturation {
                value: 1.0 + settings.saturation / 100.0,
            });
        }
        if settings.crop > 0.0 {
            let fraction = settings.crop / 100.0;
            video.push(VideoStage::Crop { fraction });
            video.push(VideoStage::Rescale {
                fraction,
                target: None,
            });
        }
        if settings.flipped {
            video.push(VideoStage::HFlip);
        }
        if settings.rotation != 0.0 {
            video.push(VideoStage::rotate_degrees(settings.rotation));
        }
        if settings.noise > 0.0 {
            video.push(VideoStage::Noise {
                strength: settings.noise,
            });
        }

        let mut audio = Vec::new();
        let tempo_rate = settings.speed;
        if tempo_rate != 1.0 {
            audio.push(AudioStage::Tempo { rate: tempo_rate });
        }
        if settings.audio_pitch != 0.0 {
            let factor = 1.0 + settings.audio_pitch / 100.0;
            if factor != tempo_rate {
                audio.push(AudioStage::Pitch {
                    factor,
                    sample_rate: self.sample_rate,
                });
            }
        }

        Ok(FilterGraph {
            platform,
            video,
            audio,
        })
    }
}

/// Checks every settings value against the domain its filter accepts.
pub fn validate_settings(settings: &ModificationSettings) -> Result<(), TransformError> {
    check_closed("speed", settings.speed, SPEED_DOMAIN)?;
    check_closed("brightness", settings.brightness, PERCENT_DOMAIN)?;
    check_closed("saturation", settings.saturation, PERCENT_DOMAIN)?;
    check_closed("rotation", settings.rotation, ROTATION_DOMAIN)?;
    check_closed("noise", settings.noise, NOISE_DOMAIN)?;

    check_finite("crop", settings.crop)?;
    if !(0.0..50.0).contains(&settings.crop) {
        return Err(TransformError::invalid_parameter(
            "crop",
            settings.crop,
            "must be within [0, 50)",
        ));
    }

    check_finite("audio_pitch", settings.audio_pitch)?;
    if settings.audio_pitch <= -50.0 || settings.audio_pitch > 100.0 {
        return Err(TransformError::invalid_parameter(
            "audio_pitch",
            settings.audio_pitch,
            "must be within (-50, 100]",
        ));
    }
    Ok(())
}

fn check_finite(parameter: &'static str, value: f64) -> Result<(), TransformError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(TransformError::invalid_parameter(
            parameter,
            value,
            "must be finite",
        ))
    }
}

fn check_closed(
    parameter: &'static str,
    value: f64,
    (min, max): (f64, f64),
) -> Result<(), TransformError> {
    check_finite(parameter, value)?;
    if value < min || value > max {
        return Err(TransformError::invalid_parameter(
            parameter,
            value,
            format!("must be within [{}, {}]", min, max),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::{ParameterGenerator, PresetCatalog};

    fn full_settings() -> ModificationSettings {
        ModificationSettings {
            speed: 1.05,
            brightness: 4.0,
            saturation: -2.0,
            crop: 2.0,
            audio_pitch: 1.5,
            flipped: true,
            rotation: 0.5,
            noise: 3.0,
        }
    }

    #[test]
    fn test_identity_compiles_to_empty_graph() {
        let graph = TransformCompiler::default()
            .compile(&ModificationSettings::default(), TargetPlatform::Tiktok)
            .unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn test_stage_order() {
        let graph = TransformCompiler::default()
            .compile(&full_settings(), TargetPlatform::Instagram)
            .unwrap();
        assert_eq!(
            graph.stage_names(),
            vec![
                "time_remap",
                "brightness",
                "saturation",
                "crop",
                "rescale",
                "hflip",
                "rotate",
                "noise",
                "tempo",
                "pitch",
            ]
        );
        assert_eq!(graph.platform, TargetPlatform::Instagram);
    }

    #[test]
    fn test_filter_values() {
        let graph = TransformCompiler::default()
            .compile(&full_settings(), TargetPlatform::Tiktok)
            .unwrap();
        let vf = graph.video_filter().unwrap();
        assert!(vf.starts_with(&format!("setpts={}*PTS,", 1.0 / 1.05)));
        assert!(vf.contains("eq=brightness=0.04"));
        assert!(vf.contains("eq=saturation=0.98"));
        assert!(vf.contains("crop=iw*0.96:ih*0.96"));
        assert!(vf.ends_with("noise=alls=3:allf=t+u"));

        let af = graph.audio_filter().unwrap();
        assert!(af.starts_with("atempo=1.05,aresample=44100,asetrate=44100*"));
        assert!(af.contains(",aresample=44100,atempo="));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let compiler = TransformCompiler::default();
        let generator = ParameterGenerator::seeded(PresetCatalog::builtin(), 11);
        for settings in generator.generate_many("maximum", 200).unwrap() {
            let a = compiler.compile(&settings, TargetPlatform::Facebook).unwrap();
            let b = compiler.compile(&settings, TargetPlatform::Facebook).unwrap();
            assert_eq!(a, b);
            assert_eq!(a.video_filter(), b.video_filter());
        }
    }

    #[test]
    fn test_tempo_matches_time_remap() {
        let compiler = TransformCompiler::default();
        let generator = ParameterGenerator::seeded(PresetCatalog::builtin(), 5);
        for preset in ["safe", "smart", "maximum"] {
            for settings in generator.generate_many(preset, 300).unwrap() {
                let graph = compiler.compile(&settings, TargetPlatform::Tiktok).unwrap();
                if settings.speed == 1.0 {
                    continue;
                }
                let remap = graph.time_remap_speed();
                assert!(graph
                    .audio
                    .iter()
                    .any(|s| matches!(s, AudioStage::Tempo { rate } if *rate == remap)));
            }
        }
    }

    #[test]
    fn test_pitch_skipped_when_equal_to_tempo() {
        let settings = ModificationSettings {
            speed: 1.25,
            audio_pitch: 25.0,
            ..Default::default()
        };
        let graph = TransformCompiler::default()
            .compile(&settings, TargetPlatform::Tiktok)
            .unwrap();
        assert_eq!(graph.audio, vec![AudioStage::Tempo { rate: 1.25 }]);
    }

    #[test]
    fn test_pitch_without_speed_change() {
        let settings = ModificationSettings {
            audio_pitch: -25.0,
            ..Default::default()
        };
        let graph = TransformCompiler::new(48_000)
            .compile(&settings, TargetPlatform::Tiktok)
            .unwrap();
        assert_eq!(
            graph.audio,
            vec![AudioStage::Pitch {
                factor: 0.75,
                sample_rate: 48_000
            }]
        );
        assert!(graph.video.is_empty());
    }

    #[test]
    fn test_out_of_domain_rejected() {
        let compiler = TransformCompiler::default();
        let cases = [
            ModificationSettings {
                speed: 0.0,
                ..Default::default()
            },
            ModificationSettings {
                speed: -1.0,
                ..Default::default()
            },
            ModificationSettings {
                crop: 50.0,
                ..Default::default()
            },
            ModificationSettings {
                brightness: f64::NAN,
                ..Default::default()
            },
            ModificationSettings {
                audio_pitch: -50.0,
                ..Default::default()
            },
            ModificationSettings {
                noise: -1.0,
                ..Default::default()
            },
        ];
        for settings in cases {
            assert!(
                matches!(
                    compiler.compile(&settings, TargetPlatform::Tiktok),
                    Err(TransformError::InvalidParameter { .. })
                ),
                "{:?} should be rejected",
                settings
            );
        }
    }

    #[test]
    fn test_error_names_parameter() {
        let err = validate_settings(&ModificationSettings {
            speed: 3.0,
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "Invalid parameter speed=3: must be within [0.5, 2]");
    }
}
