use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, Write};
use dond_types::execution::{Key, Value};
use std::{collections::HashMap, future::Future};

pub trait State {
    fn get(&self, key: &Key) -> impl Future<Output = Option<Value>>;
    fn insert(&mut self, key: Key, value: Value) -> impl Future<Output = ()>;
    fn delete(&mut self, key: &Key) -> impl Future<Output = ()>;

    fn apply(&mut self, changes: Vec<(Key, Status)>) -> impl Future<Output = ()> {
        async {
            for (key, status) in changes {
                match status {
                    Status::Update(value) => self.insert(key, value).await,
                    Status::Delete => self.delete(&key).await,
                }
            }
        }
    }
}

#[derive(Default)]
pub struct Memory {
    state: HashMap<Key, Value>,
}

impl Memory {
    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

impl State for Memory {
    async fn get(&self, key: &Key) -> Option<Value> {
        self.state.get(key).cloned()
    }

    async fn insert(&mut self, key: Key, value: Value) {
        self.state.insert(key, value);
    }

    async fn delete(&mut self, key: &Key) {
        self.state.remove(key);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Status {
    Update(Value),
    Delete,
}

impl Write for Status {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Status::Update(value) => {
                0u8.write(writer);
                value.write(writer);
            }
            Status::Delete => 1u8.write(writer),
        }
    }
}

impl Read for Status {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let kind = u8::read(reader)?;
        match kind {
            0 => Ok(Status::Update(Value::read(reader)?)),
            1 => Ok(Status::Delete),
            _ => Err(Error::InvalidEnum(kind)),
        }
    }
}

impl EncodeSize for Status {
    fn encode_size(&self) -> usize {
        1 + match self {
            Status::Update(value) => value.encode_size(),
            Status::Delete => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commonware_codec::{DecodeExt, Encode};
    use commonware_runtime::{deterministic::Runner, Runner as _};
    use dond_types::{game::GameSettings, Address};

    #[test]
    fn test_status_codec() {
        let update = Status::Update(Value::LeaderboardCursor(4));
        assert_eq!(Status::decode(update.encode()).unwrap(), update);
        assert_eq!(Status::decode(Status::Delete.encode()).unwrap(), Status::Delete);
        assert!(matches!(
            Status::decode(&[7u8][..]),
            Err(Error::InvalidEnum(7))
        ));
    }

    #[test]
    fn test_memory_apply() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let mut memory = Memory::default();
            let wallet = Address::new([1; 20]);
            memory
                .apply(vec![
                    (Key::Settings, Status::Update(Value::Settings(GameSettings::default()))),
                    (Key::LeaderboardCursor, Status::Update(Value::LeaderboardCursor(1))),
                    (Key::ActiveGame(wallet), Status::Delete),
                ])
                .await;
            assert_eq!(memory.len(), 2);
            assert_eq!(
                memory.get(&Key::LeaderboardCursor).await,
                Some(Value::LeaderboardCursor(1))
            );

            memory
                .apply(vec![(Key::LeaderboardCursor, Status::Delete)])
                .await;
            assert_eq!(memory.get(&Key::LeaderboardCursor).await, None);
            assert_eq!(memory.len(), 1);
        });
    }
}
