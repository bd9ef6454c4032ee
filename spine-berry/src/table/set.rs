use std::fmt::{Display, Formatter};

use crate::consts::{Vertebra, VERTEBRAE};

/// 椎骨标签集合. 可以为空, 也可以同时包含多个标签.
///
/// 迭代顺序固定为 C1 -> C7.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct VertebraSet(u8);

impl VertebraSet {
    /// 空集合.
    #[inline]
    pub const fn new() -> Self {
        Self(0)
    }

    /// 包含全部七个标签的集合.
    #[inline]
    pub const fn all() -> Self {
        Self((1 << VERTEBRAE.len()) - 1)
    }

    /// 加入 `v`. 返回此前是否不含 `v`.
    #[inline]
    pub fn insert(&mut self, v: Vertebra) -> bool {
        let absent = !self.contains(v);
        self.0 |= Self::bit(v);
        absent
    }

    /// 移除 `v`. 返回此前是否含有 `v`.
    #[inline]
    pub fn remove(&mut self, v: Vertebra) -> bool {
        let present = self.contains(v);
        self.0 &= !Self::bit(v);
        present
    }

    /// 是否含有 `v`.
    #[inline]
    pub const fn contains(&self, v: Vertebra) -> bool {
        self.0 & Self::bit(v) != 0
    }

    /// 标签个数.
    #[inline]
    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// 是否为空.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// 按 C1 -> C7 迭代集合内的标签.
    pub fn iter(&self) -> impl Iterator<Item = Vertebra> + '_ {
        VERTEBRAE.into_iter().filter(|v| self.contains(*v))
    }

    #[inline]
    const fn bit(v: Vertebra) -> u8 {
        1 << v.index()
    }
}

impl FromIterator<Vertebra> for VertebraSet {
    fn from_iter<T: IntoIterator<Item = Vertebra>>(iter: T) -> Self {
        let mut set = Self::new();
        for v in iter {
            set.insert(v);
        }
        set
    }
}

/// 列表字面量形式, 如 `['C1', 'C2']`, 空集合为 `[]`.
impl Display for VertebraSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for (i, v) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "'{v}'")?;
        }
        f.write_str("]")
    }
}
