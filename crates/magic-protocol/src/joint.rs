//! 关节索引和数组
//!
//! 四足机器人共 12 个关节，腿的顺序为 FR、FL、RR、RL，
//! 每条腿内部关节顺序为 HAA、HFE、KFE。
//!
//! 所有 12 维数组都必须遵守这个顺序：线性索引 = 腿索引 × 3 + 关节索引。
//! 顺序错位不会报错，只会把力矩目标悄悄发到别的关节上，
//! 因此这里用枚举把索引固定下来。
//!
//! # 示例
//!
//! ```rust
//! use magic_protocol::{JointArray, JointId, Leg, LegJoint};
//!
//! let mut q = JointArray::splat(0.0_f32);
//! q[JointId::new(Leg::RearLeft, LegJoint::Kfe)] = -1.2;
//! assert_eq!(q[11], -1.2);
//!
//! // 三元组姿态广播到四条腿
//! let stand = JointArray::from_leg_pattern([0.0_f32, 0.72, -1.44]);
//! assert_eq!(stand[4], 0.72);
//! ```

use std::fmt;
use std::ops::{Index, IndexMut};

/// 关节总数
pub const JOINT_COUNT: usize = 12;

/// 每条腿的关节数
pub const JOINTS_PER_LEG: usize = 3;

/// 腿的数量
pub const LEG_COUNT: usize = 4;

/// 腿
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Leg {
    /// 右前腿
    FrontRight = 0,
    /// 左前腿
    FrontLeft = 1,
    /// 右后腿
    RearRight = 2,
    /// 左后腿
    RearLeft = 3,
}

impl Leg {
    /// 按协议顺序排列的所有腿
    pub const ALL: [Leg; LEG_COUNT] = [
        Leg::FrontRight,
        Leg::FrontLeft,
        Leg::RearRight,
        Leg::RearLeft,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 缩写名（FR/FL/RR/RL）
    pub const fn name(self) -> &'static str {
        match self {
            Leg::FrontRight => "FR",
            Leg::FrontLeft => "FL",
            Leg::RearRight => "RR",
            Leg::RearLeft => "RL",
        }
    }
}

/// 单腿内的关节
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LegJoint {
    /// 髋关节外展/内收（Hip Abduction/Adduction）
    Haa = 0,
    /// 髋关节屈伸（Hip Flexion/Extension）
    Hfe = 1,
    /// 膝关节屈伸（Knee Flexion/Extension）
    Kfe = 2,
}

impl LegJoint {
    pub const ALL: [LegJoint; JOINTS_PER_LEG] = [LegJoint::Haa, LegJoint::Hfe, LegJoint::Kfe];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            LegJoint::Haa => "HAA",
            LegJoint::Hfe => "HFE",
            LegJoint::Kfe => "KFE",
        }
    }
}

/// 关节标识（腿 + 腿内关节）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JointId {
    pub leg: Leg,
    pub joint: LegJoint,
}

impl JointId {
    #[inline]
    pub const fn new(leg: Leg, joint: LegJoint) -> Self {
        JointId { leg, joint }
    }

    /// 线性索引（0-11）
    #[inline]
    pub const fn index(self) -> usize {
        self.leg.index() * JOINTS_PER_LEG + self.joint.index()
    }

    /// 从线性索引创建（范围检查）
    pub fn from_index(index: usize) -> Option<Self> {
        if index >= JOINT_COUNT {
            return None;
        }
        Some(JointId {
            leg: Leg::ALL[index / JOINTS_PER_LEG],
            joint: LegJoint::ALL[index % JOINTS_PER_LEG],
        })
    }

    /// 按协议顺序迭代所有关节
    pub fn all() -> impl Iterator<Item = JointId> {
        Leg::ALL
            .into_iter()
            .flat_map(|leg| LegJoint::ALL.into_iter().map(move |joint| JointId::new(leg, joint)))
    }
}

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.leg.name(), self.joint.name())
    }
}

/// 12 关节数组
///
/// 内部布局与线上结构体一致（`[T; 12]`），索引顺序见模块文档。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct JointArray<T> {
    data: [T; JOINT_COUNT],
}

impl<T: Copy> Copy for JointArray<T> {}

impl<T> JointArray<T> {
    #[inline]
    pub const fn new(data: [T; JOINT_COUNT]) -> Self {
        JointArray { data }
    }

    #[inline]
    pub fn as_array(&self) -> &[T; JOINT_COUNT] {
        &self.data
    }

    #[inline]
    pub fn as_array_mut(&mut self) -> &mut [T; JOINT_COUNT] {
        &mut self.data
    }

    #[inline]
    pub fn into_array(self) -> [T; JOINT_COUNT] {
        self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.data.iter_mut()
    }

    /// 单条腿的三个关节
    pub fn leg(&self, leg: Leg) -> &[T] {
        let start = leg.index() * JOINTS_PER_LEG;
        &self.data[start..start + JOINTS_PER_LEG]
    }

    /// 映射转换
    pub fn map<U, F>(self, f: F) -> JointArray<U>
    where
        F: FnMut(T) -> U,
    {
        JointArray::new(self.data.map(f))
    }

    /// 带关节标识的映射转换
    pub fn map_with_joint<U, F>(self, mut f: F) -> JointArray<U>
    where
        F: FnMut(JointId, T) -> U,
    {
        let mut index = 0;
        JointArray::new(self.data.map(|value| {
            let id = JointId {
                leg: Leg::ALL[index / JOINTS_PER_LEG],
                joint: LegJoint::ALL[index % JOINTS_PER_LEG],
            };
            index += 1;
            f(id, value)
        }))
    }

    /// 与另一个数组逐元素组合
    pub fn map_with<U, V, F>(self, other: JointArray<U>, mut f: F) -> JointArray<V>
    where
        F: FnMut(T, U) -> V,
    {
        let mut other = other.data.into_iter();
        JointArray::new(self.data.map(|a| match other.next() {
            Some(b) => f(a, b),
            None => unreachable!("JointArray lengths are fixed"),
        }))
    }
}

impl<T: Copy> JointArray<T> {
    /// 所有元素相同的数组
    #[inline]
    pub const fn splat(value: T) -> Self {
        JointArray::new([value; JOINT_COUNT])
    }

    /// 把单腿三元组（HAA, HFE, KFE）广播到四条腿
    ///
    /// 第 `i` 个元素取 `pattern[i % 3]`。
    pub fn from_leg_pattern(pattern: [T; JOINTS_PER_LEG]) -> Self {
        JointArray::new(std::array::from_fn(|i| pattern[i % JOINTS_PER_LEG]))
    }
}

impl<T: Default> Default for JointArray<T> {
    fn default() -> Self {
        JointArray::new(std::array::from_fn(|_| T::default()))
    }
}

impl<T> From<[T; JOINT_COUNT]> for JointArray<T> {
    fn from(data: [T; JOINT_COUNT]) -> Self {
        JointArray::new(data)
    }
}

impl<T> Index<JointId> for JointArray<T> {
    type Output = T;

    #[inline]
    fn index(&self, joint: JointId) -> &T {
        &self.data[joint.index()]
    }
}

impl<T> IndexMut<JointId> for JointArray<T> {
    #[inline]
    fn index_mut(&mut self, joint: JointId) -> &mut T {
        &mut self.data[joint.index()]
    }
}

impl<T> Index<usize> for JointArray<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        &self.data[index]
    }
}

impl<T> IndexMut<usize> for JointArray<T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.data[index]
    }
}

impl<'a, T> IntoIterator for &'a JointArray<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}
