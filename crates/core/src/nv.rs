//! Non-volatile scratch memory
//!
//! A small battery-backed byte region. Like cartridge RAM it is invisible
//! until enabled: reads return 0xFF and writes are ignored while disabled.
//!
//! # Layout
//!
//! - Byte 0: magic tag declared by the game (non-zero)
//! - Bytes 1..N: game payload
//!
//! A save is only considered present when byte 0 equals the game's magic.
//! [`NvScratch::store`] invalidates the tag first and writes it again last,
//! so a store interrupted part way reads back as "no save".

use crate::logging::{log, LogCategory, LogLevel};

/// Smallest region the protocol supports (tag + 7 payload bytes)
pub const MIN_NV_SIZE: usize = 8;

/// Value read from a disabled region
const OPEN_BUS: u8 = 0xFF;

/// Battery-backed storage as provided by the host.
pub trait NvHost {
    fn enable(&mut self);
    fn disable(&mut self);
    /// Region size in bytes
    fn len(&self) -> usize;
    fn read(&self, addr: usize) -> u8;
    fn write(&mut self, addr: usize, val: u8);
    /// Persist the region to its backing store, if any.
    fn flush(&mut self) {}

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Volatile fallback: zero-filled at construction, so a fresh process never
/// sees a valid save.
#[derive(Debug, Clone)]
pub struct MemoryNv {
    ram: Vec<u8>,
    enabled: bool,
    /// Writes still allowed before simulated power loss
    writes_left: Option<usize>,
}

impl MemoryNv {
    pub fn new(size: usize) -> Self {
        Self {
            ram: vec![0; size.max(MIN_NV_SIZE)],
            enabled: false,
            writes_left: None,
        }
    }

    /// Region seeded from existing bytes (e.g. a battery file).
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mut ram = bytes;
        if ram.len() < MIN_NV_SIZE {
            ram.resize(MIN_NV_SIZE, 0);
        }
        Self {
            ram,
            enabled: false,
            writes_left: None,
        }
    }

    /// Drop every write after the next `n`, as if power failed mid-store.
    pub fn fail_after_writes(&mut self, n: usize) {
        self.writes_left = Some(n);
    }

    pub fn bytes(&self) -> &[u8] {
        &self.ram
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl NvHost for MemoryNv {
    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn len(&self) -> usize {
        self.ram.len()
    }

    fn read(&self, addr: usize) -> u8 {
        if !self.enabled {
            return OPEN_BUS;
        }
        self.ram.get(addr).copied().unwrap_or(OPEN_BUS)
    }

    fn write(&mut self, addr: usize, val: u8) {
        if !self.enabled {
            return;
        }
        if let Some(left) = self.writes_left.as_mut() {
            if *left == 0 {
                return;
            }
            *left -= 1;
        }
        if let Some(cell) = self.ram.get_mut(addr) {
            *cell = val;
        }
    }
}

/// RAII bracket: the region is enabled for the guard's lifetime.
struct Enabled<'a> {
    host: &'a mut dyn NvHost,
}

impl<'a> Enabled<'a> {
    fn new(host: &'a mut dyn NvHost) -> Self {
        host.enable();
        Self { host }
    }
}

impl Drop for Enabled<'_> {
    fn drop(&mut self) {
        self.host.disable();
    }
}

/// Magic-tag save protocol over an [`NvHost`].
pub struct NvScratch {
    host: Box<dyn NvHost>,
    magic: u8,
    /// Payload copy returned by `load`
    view: Vec<u8>,
}

impl NvScratch {
    pub fn new(host: Box<dyn NvHost>) -> Self {
        Self {
            host,
            magic: 0,
            view: Vec::new(),
        }
    }

    /// In-memory region of the minimum size
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryNv::new(MIN_NV_SIZE)))
    }

    /// Declare the game's magic tag. Zero is reserved for "empty".
    pub fn set_magic(&mut self, magic: u8) {
        self.magic = magic;
    }

    pub fn magic(&self) -> u8 {
        self.magic
    }

    /// Payload capacity (region size minus the tag byte)
    pub fn capacity(&self) -> usize {
        self.host.len().saturating_sub(1)
    }

    /// Validated payload, or `None` when the tag does not match.
    pub fn load(&mut self) -> Option<&[u8]> {
        let len = self.host.len();
        let guard = Enabled::new(self.host.as_mut());
        let tag = guard.host.read(0);
        if self.magic == 0 || tag != self.magic {
            drop(guard);
            log(LogCategory::Save, LogLevel::Info, || {
                format!("no save (tag {:02X}, expected {:02X})", tag, self.magic)
            });
            return None;
        }
        self.view.clear();
        self.view.extend((1..len).map(|addr| guard.host.read(addr)));
        drop(guard);
        Some(&self.view)
    }

    /// Write `payload` after the tag. Bytes past the region are cut off;
    /// the rest of the region is zeroed.
    pub fn store(&mut self, payload: &[u8]) {
        if self.magic == 0 {
            log(LogCategory::Save, LogLevel::Warn, || {
                "store without a declared magic tag ignored".to_string()
            });
            return;
        }
        let len = self.host.len();
        if payload.len() + 1 > len {
            log(LogCategory::Save, LogLevel::Warn, || {
                format!("payload of {} bytes truncated to {}", payload.len(), len - 1)
            });
        }
        let guard = Enabled::new(self.host.as_mut());
        guard.host.write(0, 0);
        for addr in 1..len {
            let val = payload.get(addr - 1).copied().unwrap_or(0);
            guard.host.write(addr, val);
        }
        guard.host.write(0, self.magic);
        guard.host.flush();
    }

    /// Invalidate the tag and zero the payload.
    pub fn clear(&mut self) {
        let len = self.host.len();
        let guard = Enabled::new(self.host.as_mut());
        guard.host.write(0, 0);
        for addr in 1..len {
            guard.host.write(addr, 0);
        }
        guard.host.flush();
    }
}
