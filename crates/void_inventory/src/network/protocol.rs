//! Inventory wire messages
//!
//! Every message is framed as `u8 kind | u32 payload length | payload`,
//! little-endian throughout. Payloads:
//!
//! | Kind | Payload |
//! |------|---------|
//! | `SendDirtyItems` | `u64 inventory, u16 count, count x item record` |
//! | `MoveInventory` / `SplitInventory` | `u16 from_slot, u64 from, u16 to_slot, u64 to` |
//! | `TransferInventory` | `u16 from_slot, u64 from, u64 to` |
//! | `GiveItem` | `u64 inventory, item record, u16 slot` |
//! | `TakeItem` | `u64 inventory, u16 slot` |

use void_core::{ByteReader, ByteWriter};

use super::{ProtocolError, ProtocolResult};
use crate::container::{InventoryId, SlotId};
use crate::snapshot::ItemRecord;

/// Size of the kind tag plus length prefix
pub const FRAME_HEADER_LEN: usize = 5;

/// Message kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NetworkEvent {
    SendDirtyItems = 0,
    MoveInventory = 1,
    SplitInventory = 2,
    TransferInventory = 3,
    GiveItem = 4,
    TakeItem = 5,
}

impl NetworkEvent {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::SendDirtyItems),
            1 => Some(Self::MoveInventory),
            2 => Some(Self::SplitInventory),
            3 => Some(Self::TransferInventory),
            4 => Some(Self::GiveItem),
            5 => Some(Self::TakeItem),
            _ => None,
        }
    }

    /// Kinds a client may send to the server
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Self::MoveInventory | Self::SplitInventory | Self::TransferInventory
        )
    }
}

/// Decoded inventory message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryMessage {
    /// Server push of every dirty item of one container
    DirtyItems {
        inventory: InventoryId,
        items: Vec<ItemRecord>,
    },
    /// Move a whole stack
    Move {
        from_slot: SlotId,
        from: InventoryId,
        to_slot: SlotId,
        to: InventoryId,
    },
    /// Move half a stack into an empty slot
    Split {
        from_slot: SlotId,
        from: InventoryId,
        to_slot: SlotId,
        to: InventoryId,
    },
    /// Stack a slot's item anywhere in another container
    Transfer {
        from_slot: SlotId,
        from: InventoryId,
        to: InventoryId,
    },
    /// Targeted single insertion
    GiveItem {
        inventory: InventoryId,
        item: ItemRecord,
        slot: SlotId,
    },
    /// Targeted slot clear
    TakeItem { inventory: InventoryId, slot: SlotId },
}

impl InventoryMessage {
    pub fn kind(&self) -> NetworkEvent {
        match self {
            Self::DirtyItems { .. } => NetworkEvent::SendDirtyItems,
            Self::Move { .. } => NetworkEvent::MoveInventory,
            Self::Split { .. } => NetworkEvent::SplitInventory,
            Self::Transfer { .. } => NetworkEvent::TransferInventory,
            Self::GiveItem { .. } => NetworkEvent::GiveItem,
            Self::TakeItem { .. } => NetworkEvent::TakeItem,
        }
    }

    fn write_payload(&self, w: &mut ByteWriter) {
        match self {
            Self::DirtyItems { inventory, items } => {
                w.write_u64(inventory.raw());
                w.write_u16(items.len() as u16);
                for item in items {
                    item.write(w);
                }
            }
            Self::Move {
                from_slot,
                from,
                to_slot,
                to,
            }
            | Self::Split {
                from_slot,
                from,
                to_slot,
                to,
            } => {
                w.write_u16(*from_slot);
                w.write_u64(from.raw());
                w.write_u16(*to_slot);
                w.write_u64(to.raw());
            }
            Self::Transfer { from_slot, from, to } => {
                w.write_u16(*from_slot);
                w.write_u64(from.raw());
                w.write_u64(to.raw());
            }
            Self::GiveItem {
                inventory,
                item,
                slot,
            } => {
                w.write_u64(inventory.raw());
                item.write(w);
                w.write_u16(*slot);
            }
            Self::TakeItem { inventory, slot } => {
                w.write_u64(inventory.raw());
                w.write_u16(*slot);
            }
        }
    }

    fn read_payload(kind: NetworkEvent, r: &mut ByteReader<'_>) -> ProtocolResult<Self> {
        let message = match kind {
            NetworkEvent::SendDirtyItems => {
                let inventory = InventoryId(r.read_u64()?);
                let count = r.read_u16()? as usize;
                let mut items = Vec::with_capacity(count.min(r.remaining()));
                for _ in 0..count {
                    items.push(ItemRecord::read(r)?);
                }
                Self::DirtyItems { inventory, items }
            }
            NetworkEvent::MoveInventory | NetworkEvent::SplitInventory => {
                let from_slot = r.read_u16()?;
                let from = InventoryId(r.read_u64()?);
                let to_slot = r.read_u16()?;
                let to = InventoryId(r.read_u64()?);
                if kind == NetworkEvent::MoveInventory {
                    Self::Move {
                        from_slot,
                        from,
                        to_slot,
                        to,
                    }
                } else {
                    Self::Split {
                        from_slot,
                        from,
                        to_slot,
                        to,
                    }
                }
            }
            NetworkEvent::TransferInventory => Self::Transfer {
                from_slot: r.read_u16()?,
                from: InventoryId(r.read_u64()?),
                to: InventoryId(r.read_u64()?),
            },
            NetworkEvent::GiveItem => Self::GiveItem {
                inventory: InventoryId(r.read_u64()?),
                item: ItemRecord::read(r)?,
                slot: r.read_u16()?,
            },
            NetworkEvent::TakeItem => Self::TakeItem {
                inventory: InventoryId(r.read_u64()?),
                slot: r.read_u16()?,
            },
        };
        Ok(message)
    }

    /// Encode as a complete frame
    pub fn encode(&self) -> Vec<u8> {
        let mut payload = ByteWriter::new();
        self.write_payload(&mut payload);

        let mut frame = ByteWriter::with_capacity(FRAME_HEADER_LEN + payload.len());
        frame.write_u8(self.kind() as u8);
        frame.write_blob(payload.as_bytes());
        frame.into_bytes()
    }

    /// Decode exactly one frame
    pub fn decode(frame: &[u8]) -> ProtocolResult<Self> {
        let mut header = ByteReader::new(frame);
        let tag = header.read_u8()?;
        let kind = NetworkEvent::from_u8(tag).ok_or(ProtocolError::UnknownKind(tag))?;

        let declared = header.read_u32()? as usize;
        let actual = header.remaining();
        if declared > actual {
            return Err(ProtocolError::LengthMismatch { declared, actual });
        }
        if declared < actual {
            return Err(ProtocolError::TrailingBytes(actual - declared));
        }

        let payload = header.read_raw(declared)?;
        let mut r = ByteReader::new(payload);
        let message = Self::read_payload(kind, &mut r)?;
        if !r.is_empty() {
            return Err(ProtocolError::TrailingBytes(r.remaining()));
        }
        Ok(message)
    }
}
