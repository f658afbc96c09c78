//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: Clock の時刻 + 乱数で ULID を作る

use crate::domain::ids::{Id, IdMarker};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は ULID を払い出す
///
/// 型付きの ID は `generate::<T>()` で取り出します。
pub trait IdGenerator: Send + Sync {
    fn next_ulid(&self) -> Ulid;
}

impl<'a> dyn IdGenerator + 'a {
    pub fn generate<T: IdMarker>(&self) -> Id<T> {
        Id::from_ulid(self.next_ulid())
    }
}

/// UlidGenerator は Clock を使って ULID を生成
///
/// FixedClock を渡すと timestamp 部分が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskId, UserId};
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen: &dyn IdGenerator = &UlidGenerator::new(SystemClock);

        let id1: TaskId = id_gen.generate();
        let id2: TaskId = id_gen.generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn ulid_generator_with_fixed_clock_uses_clock_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen: &dyn IdGenerator = &UlidGenerator::new(FixedClock::new(fixed_time));

        let id: UserId = id_gen.generate();
        assert_eq!(id.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert!(id.to_string().starts_with("user-"));
    }
}
