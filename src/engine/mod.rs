//! Generation request lifecycle.
//!
//! [`GenerationHandler`] validates a [`GenerationRequest`], resolves the
//! compute device, makes sure the model is loaded, stages reference audio,
//! calls the model, writes the result to the output directory and removes
//! any temporary files it created.

mod handler;
mod reference;
mod request;

pub use handler::{Clock, GeneratedArtifact, GenerationError, GenerationHandler};
pub use request::{
    CFG_WEIGHT_RANGE, DeviceSelection, EXAGGERATION_RANGE, FLOW_CFG_SCALE_RANGE,
    GenerationRequest, MAX_NEW_TOKENS_RANGE, Mode, ReferenceAudio, TEMPERATURE_RANGE, UNSEEDED,
    ValidationError,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Waveform;
    use crate::backend::{
        BackendError, Device, HealthResponse, MockModelLoader, MockSpeechModel, SpeechModel,
    };
    use crate::output::OutputStore;
    use chrono::{DateTime, Local, TimeZone};
    use mockall::predicate::eq;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn fixed_clock() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    fn model_returning(waveform: Waveform) -> MockSpeechModel {
        let mut model = MockSpeechModel::new();
        model.expect_sample_rate().return_const(waveform.sample_rate);
        model
            .expect_generate()
            .returning(move |_| Ok(waveform.clone()));
        model
    }

    fn loader_for(model: MockSpeechModel, device: Device) -> MockModelLoader {
        let mut loader = MockModelLoader::new();
        loader
            .expect_load()
            .with(eq(device))
            .times(1)
            .return_once(move |_| Ok(Box::new(model) as Box<dyn SpeechModel>));
        loader
    }

    fn new_handler(loader: MockModelLoader, dir: &TempDir) -> GenerationHandler<MockModelLoader> {
        GenerationHandler::new(loader, OutputStore::new(dir.path().join("outputs")))
            .with_clock(fixed_clock)
    }

    fn health(cuda: bool, mps: bool) -> HealthResponse {
        HealthResponse {
            status: "healthy".to_string(),
            model: "chatterbox".to_string(),
            cuda_available: cuda,
            mps_available: mps,
            device: None,
        }
    }

    fn one_second() -> Waveform {
        Waveform::mono(vec![0.1; 24000], 24000)
    }

    // ===========================================
    // Validation
    // ===========================================

    #[test]
    fn test_empty_text_never_calls_model() {
        let temp_dir = TempDir::new().unwrap();
        let mut handler = new_handler(MockModelLoader::new(), &temp_dir);

        for text in ["", "   ", "\n\t "] {
            let result = handler.generate(GenerationRequest::new(text));
            let err = result.unwrap_err();
            assert!(err.is_validation());
            assert!(matches!(
                err,
                GenerationError::Validation(ValidationError::EmptyText)
            ));
        }

        assert!(!temp_dir.path().join("outputs").exists());
        assert_eq!(handler.loaded_device(), None);
    }

    #[test]
    fn test_out_of_range_knobs_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut handler = new_handler(MockModelLoader::new(), &temp_dir);

        let requests = [
            GenerationRequest::new("Hi").with_exaggeration(2.5),
            GenerationRequest::new("Hi").with_cfg_weight(-0.1),
            GenerationRequest::new("Hi").with_temperature(0.0),
            GenerationRequest::new("Hi").with_flow_cfg_scale(6.0),
            GenerationRequest::new("Hi").with_max_new_tokens(100),
            GenerationRequest::new("Hi").with_exaggeration(f32::NAN),
        ];

        for request in requests {
            let err = handler.generate(request).unwrap_err();
            assert!(matches!(
                err,
                GenerationError::Validation(ValidationError::OutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_negative_seed_other_than_unseeded_is_sent() {
        let temp_dir = TempDir::new().unwrap();
        let mut model = MockSpeechModel::new();
        model.expect_sample_rate().return_const(24000u32);
        model
            .expect_generate()
            .withf(|req| req.seed == Some(-5))
            .times(1)
            .returning(|_| Ok(one_second()));

        let mut handler = new_handler(loader_for(model, Device::Cpu), &temp_dir);
        handler
            .generate(
                GenerationRequest::new("Hi")
                    .with_seed(-5)
                    .with_device(Device::Cpu),
            )
            .unwrap();

        assert_eq!(GenerationRequest::new("Hi").resolved_seed(), None);
        assert_eq!(GenerationRequest::new("Hi").with_seed(0).resolved_seed(), Some(0));
    }

    #[test]
    fn test_validate_trims_text_and_keeps_knobs() {
        let params = GenerationRequest::new("  Hello world \n")
            .with_exaggeration(1.5)
            .with_cfg_weight(0.2)
            .with_temperature(0.8)
            .with_flow_cfg_scale(2.0)
            .with_max_new_tokens(2048)
            .validate()
            .unwrap();

        assert_eq!(params.text, "Hello world");
        assert_eq!(params.exaggeration, 1.5);
        assert_eq!(params.cfg_weight, 0.2);
        assert_eq!(params.temperature, Some(0.8));
        assert_eq!(params.flow_cfg_scale, Some(2.0));
        assert_eq!(params.max_new_tokens, Some(2048));
        assert_eq!(params.audio_prompt_path, None);
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let request = GenerationRequest::new("Hi")
            .with_exaggeration(2.0)
            .with_cfg_weight(0.0)
            .with_max_new_tokens(4096);
        assert!(request.validate().is_ok());
    }

    // ===========================================
    // Successful generation
    // ===========================================

    #[test]
    fn test_hello_world_default_voice() {
        let temp_dir = TempDir::new().unwrap();
        let mut model = MockSpeechModel::new();
        model.expect_sample_rate().return_const(24000u32);
        model
            .expect_generate()
            .withf(|req| {
                req.text == "Hello world" && req.seed.is_none() && req.audio_prompt_path.is_none()
            })
            .times(1)
            .returning(|_| Ok(one_second()));

        let mut handler = new_handler(loader_for(model, Device::Cpu), &temp_dir);
        let artifact = handler
            .generate(GenerationRequest::new("Hello world").with_device(Device::Cpu))
            .unwrap();

        assert_eq!(artifact.mode, Mode::DefaultVoice);
        assert_eq!(artifact.device, Device::Cpu);
        assert!(artifact.duration_seconds > 0.0);
        assert_eq!(
            artifact.path,
            temp_dir
                .path()
                .join("outputs")
                .join("generated_20250102_030405.wav")
        );
        assert!(artifact.path.is_file());
    }

    #[test]
    fn test_duration_is_sample_count_over_sample_rate() {
        let temp_dir = TempDir::new().unwrap();
        let model = model_returning(Waveform::mono(vec![0.0; 36000], 24000));

        let mut handler = new_handler(loader_for(model, Device::Cpu), &temp_dir);
        let artifact = handler
            .generate(GenerationRequest::new("Hi").with_device(Device::Cpu))
            .unwrap();

        assert!((artifact.duration_seconds - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_seed_is_sent_exactly_once() {
        let temp_dir = TempDir::new().unwrap();
        let mut model = MockSpeechModel::new();
        model.expect_sample_rate().return_const(24000u32);
        model
            .expect_generate()
            .withf(|req| req.seed == Some(42))
            .times(1)
            .returning(|_| Ok(one_second()));

        let mut handler = new_handler(loader_for(model, Device::Cpu), &temp_dir);
        handler
            .generate(
                GenerationRequest::new("Hi")
                    .with_seed(42)
                    .with_device(Device::Cpu),
            )
            .unwrap();
    }

    #[test]
    fn test_status_message_reports_mode_duration_and_path() {
        let artifact = GeneratedArtifact {
            path: PathBuf::from("outputs/generated_20250102_030405.wav"),
            duration_seconds: 2.345,
            mode: Mode::VoiceCloning,
            device: Device::Cuda,
        };

        let status = artifact.status_message();
        assert!(status.starts_with("Success! Generated speech with voice cloning"));
        assert!(status.contains("Duration: ~2.35 seconds"));
        assert!(status.contains("Saved to: outputs/generated_20250102_030405.wav"));
    }

    // ===========================================
    // Reference audio staging and cleanup
    // ===========================================

    #[test]
    fn test_reference_bytes_are_staged_then_removed() {
        let temp_dir = TempDir::new().unwrap();
        let seen: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));
        let seen_in_model = Arc::clone(&seen);

        let mut model = MockSpeechModel::new();
        model.expect_sample_rate().return_const(24000u32);
        model.expect_generate().times(1).returning(move |req| {
            let path = req.audio_prompt_path.clone().expect("reference path");
            assert!(path.is_file());
            assert_eq!(std::fs::read(&path).unwrap(), b"RIFF fake reference");
            assert!(path.extension().is_some_and(|ext| ext == "wav"));
            *seen_in_model.lock().unwrap() = Some(path);
            Ok(one_second())
        });

        let mut handler = new_handler(loader_for(model, Device::Cpu), &temp_dir);
        let artifact = handler
            .generate(
                GenerationRequest::new("Test")
                    .with_reference(ReferenceAudio::Bytes(b"RIFF fake reference".to_vec()))
                    .with_device(Device::Cpu),
            )
            .unwrap();

        assert_eq!(artifact.mode, Mode::VoiceCloning);
        let staged = seen.lock().unwrap().clone().expect("model saw a path");
        assert!(!staged.exists());
    }

    #[test]
    fn test_model_error_still_removes_staged_reference() {
        let temp_dir = TempDir::new().unwrap();
        let seen: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));
        let seen_in_model = Arc::clone(&seen);

        let mut model = MockSpeechModel::new();
        model.expect_sample_rate().return_const(24000u32);
        model.expect_generate().times(1).returning(move |req| {
            *seen_in_model.lock().unwrap() = req.audio_prompt_path.clone();
            Err(BackendError::RequestFailed(
                "500 Internal Server Error: CUDA out of memory".to_string(),
            ))
        });

        let mut handler = new_handler(loader_for(model, Device::Cpu), &temp_dir);
        let err = handler
            .generate(
                GenerationRequest::new("Test")
                    .with_reference(ReferenceAudio::Bytes(vec![1, 2, 3]))
                    .with_device(Device::Cpu),
            )
            .unwrap_err();

        assert!(!err.is_validation());
        assert!(err.status_message().starts_with("Error generating speech: "));
        assert!(err.to_string().contains("CUDA out of memory"));

        let staged = seen.lock().unwrap().clone().expect("model saw a path");
        assert!(!staged.exists());
        assert!(!temp_dir.path().join("outputs").exists());
    }

    #[test]
    fn test_output_failure_still_removes_staged_reference() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("outputs"), b"not a directory").unwrap();

        let seen: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));
        let seen_in_model = Arc::clone(&seen);

        let mut model = MockSpeechModel::new();
        model.expect_sample_rate().return_const(24000u32);
        model.expect_generate().times(1).returning(move |req| {
            *seen_in_model.lock().unwrap() = req.audio_prompt_path.clone();
            Ok(one_second())
        });

        let mut handler = new_handler(loader_for(model, Device::Cpu), &temp_dir);
        let err = handler
            .generate(
                GenerationRequest::new("Test")
                    .with_reference(ReferenceAudio::Bytes(vec![4, 5, 6]))
                    .with_device(Device::Cpu),
            )
            .unwrap_err();

        assert!(matches!(err, GenerationError::Output(_)));
        assert!(err.status_message().starts_with("Error generating speech: "));

        let staged = seen.lock().unwrap().clone().expect("model saw a path");
        assert!(!staged.exists());
    }

    #[test]
    fn test_reference_path_is_passed_through_and_kept() {
        let temp_dir = TempDir::new().unwrap();
        let reference = temp_dir.path().join("speaker.wav");
        std::fs::write(&reference, b"RIFF speaker").unwrap();
        let expected = reference.clone();

        let mut model = MockSpeechModel::new();
        model.expect_sample_rate().return_const(24000u32);
        model
            .expect_generate()
            .withf(move |req| req.audio_prompt_path.as_ref() == Some(&expected))
            .times(1)
            .returning(|_| Ok(one_second()));

        let mut handler = new_handler(loader_for(model, Device::Cpu), &temp_dir);
        let artifact = handler
            .generate(
                GenerationRequest::new("Test")
                    .with_reference(ReferenceAudio::Path(reference.clone()))
                    .with_device(Device::Cpu),
            )
            .unwrap();

        assert_eq!(artifact.mode, Mode::VoiceCloning);
        assert!(reference.exists());
    }

    // ===========================================
    // Model lifecycle
    // ===========================================

    #[test]
    fn test_model_is_loaded_once_across_requests() {
        let temp_dir = TempDir::new().unwrap();
        let mut handler = new_handler(loader_for(model_returning(one_second()), Device::Cpu), &temp_dir);

        for text in ["first", "second", "third"] {
            handler
                .generate(GenerationRequest::new(text).with_device(Device::Cpu))
                .unwrap();
        }

        assert_eq!(handler.loaded_device(), Some(Device::Cpu));
    }

    #[test]
    fn test_device_change_does_not_reload() {
        let temp_dir = TempDir::new().unwrap();
        let mut handler = new_handler(loader_for(model_returning(one_second()), Device::Cuda), &temp_dir);

        handler
            .generate(GenerationRequest::new("first").with_device(Device::Cuda))
            .unwrap();
        let artifact = handler
            .generate(GenerationRequest::new("second").with_device(Device::Cpu))
            .unwrap();

        assert_eq!(artifact.device, Device::Cuda);
    }

    #[test]
    fn test_reload_switches_device() {
        let temp_dir = TempDir::new().unwrap();
        let cuda_model = model_returning(one_second());
        let cpu_model = model_returning(one_second());

        let mut seq = mockall::Sequence::new();
        let mut loader = MockModelLoader::new();
        loader
            .expect_load()
            .with(eq(Device::Cuda))
            .times(1)
            .in_sequence(&mut seq)
            .return_once(move |_| Ok(Box::new(cuda_model) as Box<dyn SpeechModel>));
        loader
            .expect_load()
            .with(eq(Device::Cpu))
            .times(1)
            .in_sequence(&mut seq)
            .return_once(move |_| Ok(Box::new(cpu_model) as Box<dyn SpeechModel>));

        let mut handler = new_handler(loader, &temp_dir);
        handler
            .generate(GenerationRequest::new("first").with_device(Device::Cuda))
            .unwrap();

        let device = handler
            .reload(DeviceSelection::Explicit(Device::Cpu))
            .unwrap();
        assert_eq!(device, Device::Cpu);

        let artifact = handler
            .generate(GenerationRequest::new("second").with_device(Device::Cpu))
            .unwrap();
        assert_eq!(artifact.device, Device::Cpu);
    }

    #[test]
    fn test_failed_reload_keeps_current_model() {
        let temp_dir = TempDir::new().unwrap();
        let cuda_model = model_returning(one_second());

        let mut loader = MockModelLoader::new();
        loader
            .expect_load()
            .with(eq(Device::Cuda))
            .times(1)
            .return_once(move |_| Ok(Box::new(cuda_model) as Box<dyn SpeechModel>));
        loader
            .expect_load()
            .with(eq(Device::Mps))
            .times(1)
            .returning(|_| {
                Err(BackendError::RequestFailed(
                    "400 Bad Request: mps is not available".to_string(),
                ))
            });

        let mut handler = new_handler(loader, &temp_dir);
        handler
            .generate(GenerationRequest::new("first").with_device(Device::Cuda))
            .unwrap();

        let err = handler
            .reload(DeviceSelection::Explicit(Device::Mps))
            .unwrap_err();
        assert!(err.to_string().contains("mps is not available"));
        assert_eq!(handler.loaded_device(), Some(Device::Cuda));

        let artifact = handler
            .generate(GenerationRequest::new("second"))
            .unwrap();
        assert_eq!(artifact.device, Device::Cuda);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = MockModelLoader::new();
        loader.expect_load().times(2).returning(|_| {
            Err(BackendError::RequestFailed(
                "400 Bad Request: mps is not available".to_string(),
            ))
        });

        let mut handler = new_handler(loader, &temp_dir);
        for _ in 0..2 {
            let err = handler
                .generate(GenerationRequest::new("Hi").with_device(Device::Mps))
                .unwrap_err();
            assert!(err.to_string().contains("mps is not available"));
        }
        assert_eq!(handler.loaded_device(), None);
    }

    #[test]
    fn test_unload_forces_next_request_to_load() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = MockModelLoader::new();
        loader
            .expect_load()
            .times(2)
            .returning(|_| Ok(Box::new(model_returning(one_second())) as Box<dyn SpeechModel>));

        let mut handler = new_handler(loader, &temp_dir);
        handler
            .generate(GenerationRequest::new("first").with_device(Device::Cpu))
            .unwrap();
        handler.unload();
        assert_eq!(handler.loaded_device(), None);
        handler
            .generate(GenerationRequest::new("second").with_device(Device::Cpu))
            .unwrap();
    }

    // ===========================================
    // Device resolution
    // ===========================================

    #[test]
    fn test_auto_prefers_accelerators_in_order() {
        let cases = [
            (health(true, true), Device::Cuda),
            (health(false, true), Device::Mps),
            (health(false, false), Device::Cpu),
        ];

        for (probe, expected) in cases {
            let temp_dir = TempDir::new().unwrap();
            let mut loader = loader_for(model_returning(one_second()), expected);
            loader
                .expect_probe()
                .times(1)
                .return_once(move || Ok(probe));

            let mut handler = new_handler(loader, &temp_dir);
            let artifact = handler.generate(GenerationRequest::new("Hi")).unwrap();
            assert_eq!(artifact.device, expected);
        }
    }

    #[test]
    fn test_probe_failure_falls_back_to_cpu() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = MockModelLoader::new();
        loader.expect_probe().times(1).returning(|| {
            Err(BackendError::ConnectionFailed(
                "Connection refused".to_string(),
            ))
        });

        let handler = new_handler(loader, &temp_dir);
        assert_eq!(handler.detect_device(), Device::Cpu);
    }

    #[test]
    fn test_explicit_device_skips_probe() {
        let temp_dir = TempDir::new().unwrap();
        // No probe expectation: calling it would panic.
        let mut handler = new_handler(loader_for(model_returning(one_second()), Device::Mps), &temp_dir);

        let artifact = handler
            .generate(GenerationRequest::new("Hi").with_device(Device::Mps))
            .unwrap();
        assert_eq!(artifact.device, Device::Mps);
    }

    #[test]
    fn test_device_selection_parse_and_display() {
        assert_eq!(
            "auto".parse::<DeviceSelection>().unwrap(),
            DeviceSelection::Auto
        );
        assert_eq!(
            "Cuda".parse::<DeviceSelection>().unwrap(),
            DeviceSelection::Explicit(Device::Cuda)
        );
        assert!("gpu".parse::<DeviceSelection>().is_err());
        assert_eq!(DeviceSelection::Explicit(Device::Mps).to_string(), "mps");
        assert_eq!(DeviceSelection::Auto.to_string(), "auto");
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::VoiceCloning.to_string(), "voice cloning");
        assert_eq!(Mode::DefaultVoice.to_string(), "default voice");
        assert_eq!(GenerationRequest::new("x").mode(), Mode::DefaultVoice);
    }
}
