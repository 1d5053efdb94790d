//! Core emulator primitives and traits.

pub mod apu;
pub mod cpu_6502;
pub mod logging;
pub mod types {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u32>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }
    }
}

/// A CPU-like component that can be stepped; returns cycles consumed.
pub trait Cpu {
    fn reset(&mut self);
    fn step(&mut self) -> u32;
}

/// Description of a mount point (media slot) that a system supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPointInfo {
    /// Unique identifier for this mount point (e.g., "Cartridge")
    pub id: String,
    /// User-friendly name for display (e.g., "Cartridge Slot")
    pub name: String,
    /// File extensions accepted by this mount point (e.g., ["a78", "bin"])
    pub extensions: Vec<String>,
    /// Whether this mount point is required for the system to function
    pub required: bool,
}

/// A high-level System trait tying components together.
pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reset to initial power-on state
    fn reset(&mut self);

    /// Emulate until a frame is produced and return a framebuffer.
    fn step_frame(&mut self) -> Result<types::Frame, Self::Error>;

    /// Serialize the machine state to the system's binary save format.
    /// Save states never include cartridge ROM contents.
    fn save_state(&self) -> Result<Vec<u8>, Self::Error>;

    /// Restore a binary save state. On error the running machine is untouched.
    fn load_state(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Check if this system supports save/load state functionality
    fn supports_save_states(&self) -> bool {
        false
    }

    /// Get the list of mount points this system supports
    fn mount_points(&self) -> Vec<MountPointInfo>;

    /// Load media into a specific mount point
    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Unload media from a specific mount point
    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error>;

    /// Check if a mount point has media loaded
    fn is_mounted(&self, mount_point_id: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_initialization() {
        let f = types::Frame::new(10, 10);
        assert_eq!(f.pixels.len(), 100);
        assert_eq!(f.width, 10);
        assert_eq!(f.height, 10);
    }

    #[derive(Default)]
    struct MockSystem {
        counter: u8,
        media: Option<Vec<u8>>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("mock state rejected")]
    struct MockError;

    impl System for MockSystem {
        type Error = MockError;

        fn reset(&mut self) {
            self.counter = 0;
        }

        fn step_frame(&mut self) -> Result<types::Frame, Self::Error> {
            self.counter = self.counter.wrapping_add(1);
            Ok(types::Frame::new(2, 2))
        }

        fn save_state(&self) -> Result<Vec<u8>, Self::Error> {
            Ok(vec![0xA5, self.counter])
        }

        fn load_state(&mut self, data: &[u8]) -> Result<(), Self::Error> {
            match data {
                [0xA5, counter] => {
                    self.counter = *counter;
                    Ok(())
                }
                _ => Err(MockError),
            }
        }

        fn supports_save_states(&self) -> bool {
            true
        }

        fn mount_points(&self) -> Vec<MountPointInfo> {
            vec![MountPointInfo {
                id: "test".to_string(),
                name: "Test Slot".to_string(),
                extensions: vec!["bin".to_string()],
                required: false,
            }]
        }

        fn mount(&mut self, _mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
            self.media = Some(data.to_vec());
            Ok(())
        }

        fn unmount(&mut self, _mount_point_id: &str) -> Result<(), Self::Error> {
            self.media = None;
            Ok(())
        }

        fn is_mounted(&self, _mount_point_id: &str) -> bool {
            self.media.is_some()
        }
    }

    #[test]
    fn mock_system_save_load_roundtrip() {
        let mut sys = MockSystem::default();
        sys.step_frame().expect("frame");
        sys.step_frame().expect("frame");
        let state = sys.save_state().expect("save");

        let mut sys2 = MockSystem::default();
        sys2.load_state(&state).expect("load");
        assert_eq!(sys2.counter, 2);
        assert!(sys2.load_state(&[1, 2, 3]).is_err());
        assert_eq!(sys2.counter, 2);
    }

    #[test]
    fn test_system_mount_operations() {
        let mut sys = MockSystem::default();
        assert!(!sys.is_mounted("test"));
        assert!(sys.mount("test", &[1, 2, 3]).is_ok());
        assert!(sys.is_mounted("test"));
        assert!(sys.unmount("test").is_ok());
        assert!(!sys.is_mounted("test"));
        assert_eq!(sys.mount_points()[0].id, "test");
    }
}
