//! # Scratch buffers
//!
//! Per-instance buffer arena. Buffers are sized lazily for the first frame and only resized
//! again when the frame geometry changes.

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Tracks the geometry the owning algorithm's buffers are currently sized for.
#[derive(Debug, Default)]
pub struct ScratchArena {
    geometry: Option<(usize, usize)>,
    generation: u64
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Resize `buf` to `len` elements if needed, keeping its allocation otherwise.
pub fn ensure_len<T: Clone + Default>(buf: &mut Vec<T>, len: usize) {
    if buf.len() != len {
        buf.clear();
        buf.resize(len, T::default());
    }
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl ScratchArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the geometry of the incoming frame.
    ///
    /// Returns `true` when the buffers must be (re)sized, which happens on the first call and
    /// whenever the dimensions differ from the previous call.
    pub fn prepare(&mut self, width: usize, height: usize) -> bool {
        if self.geometry == Some((width, height)) {
            return false;
        }

        log::debug!(
            "Resizing scratch buffers from {:?} to {}x{}",
            self.geometry, width, height
        );

        self.geometry = Some((width, height));
        self.generation += 1;
        true
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn geometry(&self) -> Option<(usize, usize)> {
        self.geometry
    }
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resizes_only_on_change() {
        let mut arena = ScratchArena::new();

        assert!(arena.prepare(64, 48));
        assert!(!arena.prepare(64, 48));
        assert!(!arena.prepare(64, 48));
        assert_eq!(arena.generation(), 1);

        assert!(arena.prepare(32, 48));
        assert_eq!(arena.generation(), 2);
        assert_eq!(arena.geometry(), Some((32, 48)));
    }

    #[test]
    fn ensure_len_keeps_matching_buffer() {
        let mut buf = vec![3u8; 10];
        let ptr = buf.as_ptr();

        ensure_len(&mut buf, 10);
        assert_eq!(buf.as_ptr(), ptr);
        assert_eq!(buf[0], 3);

        ensure_len(&mut buf, 4);
        assert_eq!(buf, vec![0; 4]);
    }
}
