use std::collections::HashMap;

use super::error::{AsmError, AsmErrorKind};
use super::parse::{Record, Statement};

/// Label name to byte offset
pub type SymbolTable = HashMap<String, usize>;

/// Result of the first pass. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    /// Byte offset of every record, indexed like the records. A `MARK` gets
    /// the offset of the instruction following it.
    pub offsets: Vec<usize>,
    pub symbols: SymbolTable,
    /// Total image length in bytes
    pub len: usize,
}

/// Assigns every record its offset and binds every `MARK` to the offset of
/// the next instruction. Unknown labels are left for the second pass since
/// forward references are legal.
pub fn resolve(records: &[Record], capacity: usize) -> (Layout, Vec<AsmError>) {
    let mut layout = Layout::default();
    let mut errors = Vec::new();
    let mut offset = 0;
    let mut overflowed = false;

    for record in records {
        layout.offsets.push(offset);

        if let Statement::Mark(name) = &record.statement {
            if layout.symbols.contains_key(name) {
                let err = AsmError::new(
                    AsmErrorKind::DuplicateLabel,
                    format!("`{}` is already bound", name),
                    record.line_nr,
                );
                log::error!("{}", err);
                errors.push(err);
            } else {
                log::debug!("[{}] Bound `{}` to 0x{:02X}", record.line_nr, name, offset);
                layout.symbols.insert(name.clone(), offset);
            }
        }

        offset += record.len() as usize;

        if !overflowed && offset > capacity {
            overflowed = true;
            let err = AsmError::new(
                AsmErrorKind::ImageTooLarge,
                format!("image exceeds {} bytes", capacity),
                record.line_nr,
            );
            log::error!("{}", err);
            errors.push(err);
        }
    }

    layout.len = offset;

    (layout, errors)
}
