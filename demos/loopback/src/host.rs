//! Host and simulated UI side.

use handover_bridge::{
    Bridge, BridgeConfig, BridgeHandle, ChannelSink, EmittedEvent, LoopbackFactory, LoopbackSurface,
    MethodResult,
};
use handover_core::{HandoverKind, Payload, ResponseEnvelope, StartParams};
use tokio::sync::mpsc;

pub async fn run(config: BridgeConfig, params: StartParams) -> anyhow::Result<()> {
    let factory = LoopbackFactory::new();
    factory.on_method(|call| match call.method.as_str() {
        "change_language" | "change_theme_mode" => Some(MethodResult::Success(Payload::from(true))),
        _ => Some(MethodResult::NotImplemented),
    });

    let (sink, events) = ChannelSink::new();
    let (bridge, handle) = Bridge::new(config, factory.clone(), sink);
    let executor = bridge.spawn();
    let ui = tokio::spawn(answer_handovers(events, handle.clone()));

    handle.start_with(&params).await?;
    handle.attach_surface(LoopbackSurface::new())?;

    let engine = factory
        .current()
        .ok_or_else(|| anyhow::anyhow!("engine not created"))?;

    let token = engine
        .request(&handle, HandoverKind::ProvideAccessToken.as_str(), Payload::empty_map())
        .await;
    tracing::info!("provideAccessToken -> {:?}", token);

    let onboarding = engine
        .request(&handle, HandoverKind::StartOnboarding.as_str(), Payload::Null)
        .await;
    tracing::info!("startOnboarding -> {:?}", onboarding);

    let analytics = Payload::map([("data", Payload::from(b"page_view".to_vec()))]);
    let logged = engine
        .request(&handle, HandoverKind::ReceiveAnalyticsEvent.as_str(), analytics)
        .await;
    tracing::info!("receiveAnalyticsEvent -> {:?}", logged);

    let layout = engine
        .request(&handle, "internalRequestLayout", Payload::Null)
        .await;
    tracing::debug!("internalRequestLayout -> {:?}", layout);

    let changed = handle.change_language("nl").await?;
    tracing::info!("change_language -> {}", changed);
    let changed = handle.change_theme_mode("dark").await?;
    tracing::info!("change_theme_mode -> {}", changed);

    handle.exit()?;
    handle.stop_engine().await?;
    tracing::info!("Engine stopped");

    handle.shutdown()?;
    executor.await?;
    ui.abort();
    Ok(())
}

/// Plays the UI framework: logs every event and answers those expecting it.
async fn answer_handovers(mut events: mpsc::UnboundedReceiver<EmittedEvent>, handle: BridgeHandle) {
    while let Some(EmittedEvent {
        event_name,
        envelope,
    }) = events.recv().await
    {
        match serde_json::to_string(&envelope) {
            Ok(json) => tracing::info!("{} {}", event_name, json),
            Err(e) => tracing::warn!("Unprintable envelope: {}", e),
        }

        let Some(id) = envelope.correlation_id else {
            continue;
        };
        let response = match envelope.name.parse::<HandoverKind>() {
            Ok(HandoverKind::ProvideAccessToken) => Payload::from("demo-access-token"),
            Ok(HandoverKind::StartOnboarding) => Payload::map([("ok", true)]),
            _ => Payload::Null,
        };
        let answer = ResponseEnvelope::new(id, response).to_payload();
        if let Err(e) = handle.respond_to_event(event_name, answer) {
            tracing::warn!("Could not answer handover: {}", e);
            break;
        }
    }
}
