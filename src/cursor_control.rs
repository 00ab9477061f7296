//! Desktop pointer queries for X11-based systems.
//!
//! The eyeballs can follow the pointer instead of staying centred. The
//! pointer is read through [`PointerSource`] so the remapping code does not
//! depend on a display server.

use crate::{Error, Result};
use log::info;
use x11rb::{
    connection::Connection,
    protocol::xproto::{ConnectionExt, Window},
    rust_connection::RustConnection,
};

/// Pointer position with the size of the screen it is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerSample {
    pub x: i32,
    pub y: i32,
    pub screen_width: i32,
    pub screen_height: i32,
}

impl PointerSample {
    /// Eyeball target for this pointer position
    ///
    /// Screen centre maps to (0, 0), the right edge to x = 1 and the top edge
    /// to y = 1. Returns `None` for an empty screen.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn eyeball_target(&self) -> Option<(f32, f32)> {
        if self.screen_width <= 0 || self.screen_height <= 0 {
            return None;
        }
        let (w, h) = (self.screen_width as f32, self.screen_height as f32);
        let (half_w, half_h) = (w / 2.0, h / 2.0);
        let x = (self.x as f32 - half_w) / (w - half_w);
        let y = -(self.y as f32 - half_h) / (h - half_h);
        Some((x, y))
    }
}

/// Source of desktop pointer positions
pub trait PointerSource {
    /// Current pointer position
    ///
    /// # Errors
    ///
    /// Returns an error if the position cannot be queried
    fn sample(&mut self) -> Result<PointerSample>;
}

/// Pointer source backed by an X11 connection
pub struct X11Pointer {
    connection: RustConnection,
    root: Window,
    screen_width: u16,
    screen_height: u16,
}

impl X11Pointer {
    /// Connect to the default X11 display
    ///
    /// # Errors
    ///
    /// Returns an error if the display cannot be reached
    pub fn new() -> Result<Self> {
        info!("Connecting to X11 for pointer queries");

        let (connection, screen_num) = RustConnection::connect(None)
            .map_err(|e| Error::CursorControl(format!("Failed to connect to X11: {e}")))?;

        let screen = connection
            .setup()
            .roots
            .get(screen_num)
            .ok_or_else(|| Error::CursorControl("Failed to get screen".to_string()))?;
        let (root, screen_width, screen_height) = (screen.root, screen.width_in_pixels, screen.height_in_pixels);

        info!("Connected to X11 display, screen: {screen_width}x{screen_height}");

        Ok(Self {
            connection,
            root,
            screen_width,
            screen_height,
        })
    }

    /// Get current cursor position
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be sent or answered
    pub fn get_position(&self) -> Result<(i16, i16)> {
        let reply = self
            .connection
            .query_pointer(self.root)
            .map_err(|e| Error::CursorControl(format!("Failed to send query pointer: {e}")))?
            .reply()
            .map_err(|e| Error::CursorControl(format!("Failed to query pointer: {e}")))?;

        Ok((reply.root_x, reply.root_y))
    }

    /// Get screen dimensions
    #[must_use]
    pub const fn get_screen_size(&self) -> (u16, u16) {
        (self.screen_width, self.screen_height)
    }
}

impl PointerSource for X11Pointer {
    fn sample(&mut self) -> Result<PointerSample> {
        let (x, y) = self.get_position()?;
        Ok(PointerSample {
            x: i32::from(x),
            y: i32::from(y),
            screen_width: i32::from(self.screen_width),
            screen_height: i32::from(self.screen_height),
        })
    }
}
