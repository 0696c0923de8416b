use memdisk_core::{download::DownloadError, options::OptionsError};
use thiserror::Error;
use uefi::{
    Status,
    proto::{device_path::build::BuildError, loaded_image::LoadOptionsError},
};

#[derive(Debug, Error)]
pub enum BootError {
    #[error("Couldn't read the image load options ({0:?})")]
    LoadOptions(LoadOptionsError),
    #[error(transparent)]
    Options(#[from] OptionsError),
    #[error("Couldn't open {name} protocol ({status:?})")]
    MissingProtocol { name: &'static str, status: Status },
    #[error("Error starting download ({0:?})")]
    TransportStart(Status),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error("RAM disk register failed ({0:?})")]
    Register(Status),
    #[error("Couldn't install ACPI {signature} table ({status:?})")]
    Advertise { signature: &'static str, status: Status },
    #[error("Couldn't build the loader device path ({0:?})")]
    DevicePath(BuildError),
    #[error("Firmware call failed ({0:?})")]
    Firmware(Status),
}

impl BootError {
    #[must_use]
    /// Status code returned to the firmware when memdisk stops on this error.
    pub const fn status(&self) -> Status {
        match self {
            Self::LoadOptions(_) => Status::INVALID_PARAMETER,
            Self::Options(error) => error.status(),
            Self::Download(error) => error.status(),
            Self::DevicePath(_) => Status::BUFFER_TOO_SMALL,
            Self::MissingProtocol { status, .. } | Self::Advertise { status, .. } => *status,
            Self::TransportStart(status) | Self::Register(status) | Self::Firmware(status) => {
                *status
            }
        }
    }

    /// Wraps the failure to open a protocol.
    pub fn missing_protocol(name: &'static str) -> impl FnOnce(uefi::Error) -> Self {
        move |error| Self::MissingProtocol {
            name,
            status: error.status(),
        }
    }
}

impl From<uefi::Error> for BootError {
    fn from(error: uefi::Error) -> Self {
        Self::Firmware(error.status())
    }
}

impl From<BuildError> for BootError {
    fn from(error: BuildError) -> Self {
        Self::DevicePath(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_passthrough() {
        let error = BootError::from(DownloadError::Transport(Status::TFTP_ERROR));
        assert_eq!(error.status(), Status::TFTP_ERROR);

        let error = BootError::from(uefi::Error::from(Status::NOT_FOUND));
        assert_eq!(error.status(), Status::NOT_FOUND);

        assert_eq!(
            BootError::Register(Status::OUT_OF_RESOURCES).status(),
            Status::OUT_OF_RESOURCES
        );
    }

    #[test]
    fn test_configuration_errors() {
        let error = BootError::from(OptionsError::MissingLocator);
        assert_eq!(error.status(), Status::INVALID_PARAMETER);

        let error = BootError::missing_protocol("iPXE Download")(uefi::Error::from(
            Status::UNSUPPORTED,
        ));
        let BootError::MissingProtocol { name, status } = &error else {
            panic!("unexpected error {error:?}");
        };
        assert_eq!(*name, "iPXE Download");
        assert_eq!(*status, Status::UNSUPPORTED);
    }
}
