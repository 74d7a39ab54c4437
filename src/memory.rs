pub type Byte = u8; // 1 byte
pub type Word = u16; // 2 bytes

/// Default memory, one cell for every 8-bit address
pub type StdMem = Memory<256>;

/// Emulates the data memory addressed by `LD` and `ST`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Memory<const S: usize> {
    /// The actual data of the memory
    pub data: [Byte; S],
}

impl<const S: usize> Default for Memory<S> {
    /// Initializes the memory
    fn default() -> Self {
        Memory { data: [0; S] }
    }
}

impl<const S: usize> Memory<S> {
    /// Number of addressable cells
    pub const fn size(&self) -> usize {
        S
    }

    /// Reads a byte from the memory, `None` if the address is not backed by a cell
    pub fn read_byte(&self, position: Byte) -> Option<Byte> {
        self.data.get(position as usize).copied()
    }

    /// Writes a byte to the memory, `None` if the address is not backed by a cell
    pub fn write_byte(&mut self, position: Byte, value: Byte) -> Option<()> {
        let cell = self.data.get_mut(position as usize)?;
        *cell = value;
        Some(())
    }

    /// Writes an array of bytes to the memory
    pub fn write_array(&mut self, position: Byte, data: &[Byte]) -> Option<()> {
        let start = position as usize;
        let target = self.data.get_mut(start..start + data.len())?;
        target.copy_from_slice(data);
        Some(())
    }

    /// Logs the memory as rows of 16 hex bytes, skipping rows that are all zero
    pub fn dump(&self) {
        for (row, chunk) in self.data.chunks(16).enumerate() {
            if chunk.iter().all(|byte| *byte == 0) {
                continue;
            }

            let bytes = chunk
                .iter()
                .map(|byte| format!("{:02X}", byte))
                .collect::<Vec<_>>()
                .join(" ");
            log::info!("0x{:02X}: {}", row * 16, bytes);
        }
    }
}
