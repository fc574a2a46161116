//! Surface double that records every call in order.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use overlay::render::Rendered;
use overlay::Surface;

#[derive(Default)]
pub struct FakeSurface {
    log: Mutex<Vec<String>>,
    live: Mutex<usize>,
}

impl FakeSurface {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Render entries after the last `create`.
    pub fn current_renders(&self) -> Vec<String> {
        let log = self.log();
        let start = log.iter().rposition(|e| e.starts_with("create")).map_or(0, |i| i + 1);
        log[start..]
            .iter()
            .filter_map(|e| e.strip_prefix("render:").map(str::to_string))
            .collect()
    }

    /// The host page deletes the element behind the controller's back.
    pub fn detach_by_host(&self) {
        *self.live.lock().unwrap() = 0;
        self.log.lock().unwrap().push("detached".into());
    }

    /// Poll until an entry matching `predicate` appears.
    pub async fn wait_for<F>(&self, predicate: F)
    where
        F: Fn(&str) -> bool,
    {
        for _ in 0..200 {
            if self.log().iter().any(|e| predicate(e)) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("surface never matched; log: {:?}", self.log());
    }
}

#[async_trait]
impl Surface for FakeSurface {
    fn create(&self, reattached: bool) {
        let mut live = self.live.lock().unwrap();
        assert_eq!(*live, 0, "a second surface was created while one is live");
        *live = 1;
        self.log.lock().unwrap().push(format!("create:{}", reattached));
    }

    async fn ready(&self) {}

    fn render(&self, content: &Rendered) {
        self.log
            .lock()
            .unwrap()
            .push(format!("render:{}", content.plain_text));
    }

    fn remove(&self) {
        *self.live.lock().unwrap() = 0;
        self.log.lock().unwrap().push("remove".into());
    }

    fn is_attached(&self) -> bool {
        *self.live.lock().unwrap() > 0
    }
}
