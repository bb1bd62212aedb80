use gpui::Context;
use gpui_tokio_bridge::Tokio;

/// Runs a blocking repository call on the Tokio side, then applies the result
/// back on the entity. Results for entities that were dropped meanwhile are discarded.
pub fn spawn_store_call<T, R, Call, Then>(cx: &mut Context<T>, call: Call, then: Then)
where
    T: 'static,
    R: Send + 'static,
    Call: FnOnce() -> R + Send + 'static,
    Then: FnOnce(&mut T, R, &mut Context<T>) + 'static,
{
    let task = Tokio::spawn(cx, async move { call() });

    cx.spawn(async move |this, cx| match task.await {
        Ok(result) => {
            let _ = this.update(cx, |this, cx| then(this, result, cx));
        }
        Err(err) => {
            tracing::error!("repository task failed: {err}");
        }
    })
    .detach();
}

