// id.rs — Arena identifiers for the IR
//
// Every IR entity lives in an `IrContext` arena and is addressed by a dense
// u32 index allocated in creation order, so iteration over ids is
// deterministic and ids stay valid while other entities are erased.

/// Identifier of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub u32);

/// Identifier of an SSA value (op result or block argument).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub u32);

macro_rules! impl_index {
    ($($id:ident),+) => {
        $(
            impl $id {
                pub(crate) fn index(self) -> usize {
                    self.0 as usize
                }

                pub(crate) fn from_index(index: usize) -> Self {
                    $id(u32::try_from(index).unwrap_or_else(|_| {
                        panic!("{} arena exceeds u32::MAX entries", stringify!($id))
                    }))
                }
            }
        )+
    };
}

impl_index!(OpId, ValueId, BlockId, RegionId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_order_by_allocation() {
        assert!(OpId(1) < OpId(2));
        assert_eq!(ValueId::from_index(7).index(), 7);
    }
}
