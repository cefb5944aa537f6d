use crate::script_num::{make_script_num, read_script_num};
use core::fmt::Debug;
use core::mem::size_of;
use txscript_errors::TxScriptError;

pub(crate) type Stack = Vec<Vec<u8>>;

pub(crate) trait DataStack {
    fn pop_item<const SIZE: usize, T: Debug>(&mut self) -> Result<[T; SIZE], TxScriptError>
    where
        Vec<u8>: OpcodeData<T>;
    fn last_item<const SIZE: usize, T: Debug>(&self) -> Result<[T; SIZE], TxScriptError>
    where
        Vec<u8>: OpcodeData<T>;
    fn pop_raw<const SIZE: usize>(&mut self) -> Result<[Vec<u8>; SIZE], TxScriptError>;
    fn last_raw<const SIZE: usize>(&self) -> Result<[Vec<u8>; SIZE], TxScriptError>;
    fn push_item<T: Debug>(&mut self, item: T)
    where
        Vec<u8>: OpcodeData<T>;
    fn drop_item<const SIZE: usize>(&mut self) -> Result<(), TxScriptError>;
    fn dup_item<const SIZE: usize>(&mut self) -> Result<(), TxScriptError>;
    fn over_item<const SIZE: usize>(&mut self) -> Result<(), TxScriptError>;
    fn rot_item<const SIZE: usize>(&mut self) -> Result<(), TxScriptError>;
    fn swap_item<const SIZE: usize>(&mut self) -> Result<(), TxScriptError>;
    fn nip_item(&mut self) -> Result<(), TxScriptError>;
    fn tuck_item(&mut self) -> Result<(), TxScriptError>;
    fn pick_item(&mut self, n: usize) -> Result<(), TxScriptError>;
    fn roll_item(&mut self, n: usize) -> Result<(), TxScriptError>;
}

/// Conversion between a raw stack element and a typed opcode operand.
///
/// `require_minimal`/`max_len` mirror the equivalent [`crate::script_num`]
/// parameters — they only matter for the numeric impls.
pub(crate) trait OpcodeData<T> {
    fn deserialize_with_flags(&self, require_minimal: bool, max_len: usize) -> Result<T, TxScriptError>;
    fn deserialize(&self) -> Result<T, TxScriptError> {
        self.deserialize_with_flags(false, size_of::<i32>())
    }
    fn serialize(from: &T) -> Self;
}

impl OpcodeData<i64> for Vec<u8> {
    #[inline]
    fn deserialize_with_flags(&self, require_minimal: bool, max_len: usize) -> Result<i64, TxScriptError> {
        read_script_num(self, require_minimal, max_len)
    }

    #[inline]
    fn serialize(from: &i64) -> Self {
        make_script_num(*from)
    }
}

impl OpcodeData<i32> for Vec<u8> {
    #[inline]
    fn deserialize_with_flags(&self, require_minimal: bool, max_len: usize) -> Result<i32, TxScriptError> {
        let value = read_script_num(self, require_minimal, max_len)?;
        i32::try_from(value).map_err(|_| TxScriptError::NumberTooBig(format!("{value} does not fit in i32")))
    }

    #[inline]
    fn serialize(from: &i32) -> Self {
        make_script_num(i64::from(*from))
    }
}

impl OpcodeData<bool> for Vec<u8> {
    #[inline]
    fn deserialize_with_flags(&self, _require_minimal: bool, _max_len: usize) -> Result<bool, TxScriptError> {
        if self.is_empty() {
            Ok(false)
        } else {
            // Negative zero (any all-zero magnitude with the sign bit set) is also false.
            Ok(self[self.len() - 1] & 0x7f != 0x0 || self[..self.len() - 1].iter().any(|&b| b != 0x0))
        }
    }

    #[inline]
    fn serialize(from: &bool) -> Self {
        match from {
            true => vec![1],
            false => vec![],
        }
    }
}

impl DataStack for Stack {
    #[inline]
    fn pop_item<const SIZE: usize, T: Debug>(&mut self) -> Result<[T; SIZE], TxScriptError>
    where
        Vec<u8>: OpcodeData<T>,
    {
        if self.len() < SIZE {
            return Err(TxScriptError::InvalidStackOperation(SIZE, self.len()));
        }
        Ok(<[T; SIZE]>::try_from(self.split_off(self.len() - SIZE).iter().map(|v| v.deserialize()).collect::<Result<Vec<T>, _>>()?)
            .expect("length checked above"))
    }

    #[inline]
    fn last_item<const SIZE: usize, T: Debug>(&self) -> Result<[T; SIZE], TxScriptError>
    where
        Vec<u8>: OpcodeData<T>,
    {
        if self.len() < SIZE {
            return Err(TxScriptError::InvalidStackOperation(SIZE, self.len()));
        }
        Ok(<[T; SIZE]>::try_from(self[self.len() - SIZE..].iter().map(|v| v.deserialize()).collect::<Result<Vec<T>, _>>()?)
            .expect("length checked above"))
    }

    #[inline]
    fn pop_raw<const SIZE: usize>(&mut self) -> Result<[Vec<u8>; SIZE], TxScriptError> {
        if self.len() < SIZE {
            return Err(TxScriptError::InvalidStackOperation(SIZE, self.len()));
        }
        Ok(<[Vec<u8>; SIZE]>::try_from(self.split_off(self.len() - SIZE)).expect("length checked above"))
    }

    #[inline]
    fn last_raw<const SIZE: usize>(&self) -> Result<[Vec<u8>; SIZE], TxScriptError> {
        if self.len() < SIZE {
            return Err(TxScriptError::InvalidStackOperation(SIZE, self.len()));
        }
        Ok(<[Vec<u8>; SIZE]>::try_from(self[self.len() - SIZE..].to_vec()).expect("length checked above"))
    }

    #[inline]
    fn push_item<T: Debug>(&mut self, item: T)
    where
        Vec<u8>: OpcodeData<T>,
    {
        Vec::push(self, OpcodeData::serialize(&item));
    }

    #[inline]
    fn drop_item<const SIZE: usize>(&mut self) -> Result<(), TxScriptError> {
        if self.len() >= SIZE {
            self.truncate(self.len() - SIZE);
            Ok(())
        } else {
            Err(TxScriptError::InvalidStackOperation(SIZE, self.len()))
        }
    }

    #[inline]
    fn dup_item<const SIZE: usize>(&mut self) -> Result<(), TxScriptError> {
        if self.len() >= SIZE {
            self.extend_from_slice(self.clone()[self.len() - SIZE..].iter().as_slice());
            Ok(())
        } else {
            Err(TxScriptError::InvalidStackOperation(SIZE, self.len()))
        }
    }

    #[inline]
    fn over_item<const SIZE: usize>(&mut self) -> Result<(), TxScriptError> {
        if self.len() >= 2 * SIZE {
            self.extend_from_slice(self.clone()[self.len() - 2 * SIZE..self.len() - SIZE].iter().as_slice());
            Ok(())
        } else {
            Err(TxScriptError::InvalidStackOperation(2 * SIZE, self.len()))
        }
    }

    #[inline]
    fn rot_item<const SIZE: usize>(&mut self) -> Result<(), TxScriptError> {
        if self.len() >= 3 * SIZE {
            let drained = self.drain(self.len() - 3 * SIZE..self.len() - 2 * SIZE).collect::<Vec<Vec<u8>>>();
            self.extend(drained);
            Ok(())
        } else {
            Err(TxScriptError::InvalidStackOperation(3 * SIZE, self.len()))
        }
    }

    #[inline]
    fn swap_item<const SIZE: usize>(&mut self) -> Result<(), TxScriptError> {
        if self.len() >= 2 * SIZE {
            let drained = self.drain(self.len() - 2 * SIZE..self.len() - SIZE).collect::<Vec<Vec<u8>>>();
            self.extend(drained);
            Ok(())
        } else {
            Err(TxScriptError::InvalidStackOperation(2 * SIZE, self.len()))
        }
    }

    #[inline]
    fn nip_item(&mut self) -> Result<(), TxScriptError> {
        if self.len() >= 2 {
            self.remove(self.len() - 2);
            Ok(())
        } else {
            Err(TxScriptError::InvalidStackOperation(2, self.len()))
        }
    }

    #[inline]
    fn tuck_item(&mut self) -> Result<(), TxScriptError> {
        if self.len() >= 2 {
            let top = self[self.len() - 1].clone();
            self.insert(self.len() - 2, top);
            Ok(())
        } else {
            Err(TxScriptError::InvalidStackOperation(2, self.len()))
        }
    }

    #[inline]
    fn pick_item(&mut self, n: usize) -> Result<(), TxScriptError> {
        if n < self.len() {
            let item = self[self.len() - 1 - n].clone();
            self.push(item);
            Ok(())
        } else {
            Err(TxScriptError::InvalidStackOperation(n + 1, self.len()))
        }
    }

    #[inline]
    fn roll_item(&mut self, n: usize) -> Result<(), TxScriptError> {
        if n < self.len() {
            let item = self.remove(self.len() - 1 - n);
            self.push(item);
            Ok(())
        } else {
            Err(TxScriptError::InvalidStackOperation(n + 1, self.len()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_roundtrip_preserves_depth() {
        let mut stack: Stack = vec![];
        stack.push_item(42i64);
        stack.push_item(true);
        assert_eq!(stack.len(), 2);
        let [b]: [bool; 1] = stack.pop_item().unwrap();
        assert!(b);
        let [n]: [i64; 1] = stack.pop_item().unwrap();
        assert_eq!(n, 42);
        assert!(stack.is_empty());
    }

    #[test]
    fn pick_and_roll_match_forth_semantics() {
        let mut stack: Stack = vec![vec![1], vec![2], vec![3]];
        stack.pick_item(2).unwrap();
        assert_eq!(stack, vec![vec![1], vec![2], vec![3], vec![1]]);

        let mut stack: Stack = vec![vec![1], vec![2], vec![3]];
        stack.roll_item(2).unwrap();
        assert_eq!(stack, vec![vec![2], vec![3], vec![1]]);
    }

    #[test]
    fn underflow_is_reported_not_panicked() {
        let mut stack: Stack = vec![];
        let err = stack.drop_item::<1>().unwrap_err();
        assert_eq!(err, TxScriptError::InvalidStackOperation(1, 0));
    }
}
