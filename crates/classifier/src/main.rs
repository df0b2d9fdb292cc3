use classifier::{
    ClassifierConfig, ClassifierError, ClassifierService, ModelContext, format_failure,
    logging::init_telemetry, service::image_path_arg,
};
use preprocess::ImagePreprocessor;
use std::any::Any;
use std::ffi::OsString;
use std::panic::{self, AssertUnwindSafe};
use std::process::ExitCode;

#[cfg(feature = "ort-backend")]
use classifier::backend::ort::OrtBackend as Backend;

#[cfg(not(feature = "ort-backend"))]
compile_error!("The 'ort-backend' feature must be enabled to build the predict binary");

fn main() -> ExitCode {
    let args: Vec<OsString> = std::env::args_os().skip(1).collect();

    // Usage errors win over configuration errors.
    if let Err(e) = image_path_arg(&args) {
        return ExitCode::from(format_failure(&e).emit());
    }

    let config = match ClassifierConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            let error = ClassifierError::Config(format!("{e:#}"));
            return ExitCode::from(format_failure(&error).emit());
        }
    };

    let _telemetry = init_telemetry(&config);

    tracing::debug!(config = ?config, "Loaded configuration");
    if let Some(url) = config.model_url.as_deref() {
        tracing::debug!(model_url = url, "Model source configured; download is not performed");
    }

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let context = ModelContext::<Backend>::new(&config.model_path, config.backend.clone());
        let service = ClassifierService::new(context, ImagePreprocessor::new(config.preprocess));
        service.classify_args(&args)
    }))
    .unwrap_or_else(|panic| {
        let error = ClassifierError::Internal(panic_message(panic.as_ref()));
        tracing::error!(error = %error, "Classification panicked");
        format_failure(&error)
    });

    ExitCode::from(result.emit())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
