//! Shared fixtures for distributor integration tests.
#![allow(dead_code)]

use distributor::distributor::{Distributor, DistributorSettings};
use distributor::event::{Event, EventKind};
use distributor::model::{DispatchOrder, ProgramBundle};
use distributor::protocol::Outbound;
use distributor::queue::{Manual, WorkSource};
use num_bigint::BigInt;
use secrecy::SecretString;
use tokio::sync::mpsc::UnboundedReceiver;

pub const NAME: &str = "slowsquare";
pub const CREDENTIAL: &str = "643d1e29b4c27bd729faa938ea99e604";

pub fn bundle() -> ProgramBundle {
    ProgramBundle {
        fingerprint: "8e892921ccf4ab68af29d65b82a9f60e".to_string(),
        address: "http://example.invalid/slowsquare.app".to_string(),
        file_name: "slowsquare.app".to_string(),
    }
}

pub fn settings() -> DistributorSettings {
    DistributorSettings {
        name: NAME.to_string(),
        credential: SecretString::from(CREDENTIAL),
        bundle: bundle(),
        upload: "data:".to_string(),
    }
}

/// Generates 1, 2, 3, ... one payload per call.
#[derive(Debug, Default)]
pub struct Counting {
    pub calls: u64,
}

impl WorkSource for Counting {
    type Payload = BigInt;

    fn generate(&mut self) -> Vec<BigInt> {
        self.calls += 1;
        vec![BigInt::from(self.calls)]
    }
}

/// A distributor that has completed the handshake, with `seed` unsent.
pub fn ready_with_seed(seed: &[i64]) -> Distributor<Manual<BigInt>> {
    let mut distributor = Distributor::new(settings(), Manual::new());
    distributor
        .queue_mut()
        .seed(seed.iter().copied().map(BigInt::from));
    distributor.connected();
    distributor.handle_line("HELLO").expect("handshake");
    distributor
}

/// The first `DISPATCH` order in a batch of outbound commands.
pub fn dispatched(out: &[Outbound]) -> DispatchOrder {
    out.iter()
        .find_map(|o| match o {
            Outbound::Dispatch(order) => Some(order.clone()),
            _ => None,
        })
        .expect("expected a DISPATCH")
}

pub fn count_have_work(out: &[Outbound]) -> usize {
    out.iter().filter(|o| matches!(o, Outbound::HaveWork)).count()
}

pub fn drain_events(rx: &mut UnboundedReceiver<Event>) -> Vec<EventKind> {
    std::iter::from_fn(|| rx.try_recv().ok())
        .map(|event| event.kind)
        .collect()
}

pub fn finished_line(id: &str, answer: &str) -> String {
    format!(r#"WORKFINISHED {{"id":"{id}","files":[["d41d8cd98f00b204e9800998ecf8427e","data:text/plain,{answer}","out"]]}}"#)
}
