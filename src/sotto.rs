use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use sotto::event::SottoEvent;
use sotto::hotkey::{self, HotkeyCombo};
use sotto::icon::IconExt;
use sotto::notify::{Alerts, NotificationLayer, SystemAlerts};
use sotto::pipeline::TranscribePipeline;
use sotto::settings::SettingsController;
use sotto::{
    ConfigManager, DEFAULT_LOG_LEVEL, MicState, VERSION, WhisperModel, input_device_names,
};
use tao::event::{Event, StartCause};
use tao::event_loop::{ControlFlow, EventLoop, EventLoopBuilder};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tray_icon::menu::{
    AboutMetadataBuilder, CheckMenuItem, Menu, MenuEvent, MenuItem, PredefinedMenuItem, Submenu,
};
use tray_icon::{TrayIconBuilder, TrayIconEvent};

fn main() -> Result<()> {
    // Initialize the logger
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SOTTO_LOG")
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
        )
        .finish()
        .with(NotificationLayer::new())
        .init();

    // Load config, migrating from the legacy location if needed
    let config_manager = ConfigManager::new()?;
    let config = Arc::new(RwLock::new(config_manager.load()?));
    // save back the config to create the file if it doesn't exist
    if let Err(e) = config_manager.save(&config.read()) {
        warn!("Failed to write config file: {:#}", e);
    }

    // Parse the hotkey combo, falling back to the default when the
    // configured string has no usable keys
    let combo = HotkeyCombo::parse(&config.read().hotkey).unwrap_or_else(|e| {
        warn!("{:#}, falling back to the default hotkey", e);
        HotkeyCombo::default()
    });
    let combo = Arc::new(RwLock::new(combo));

    let alerts: Arc<dyn Alerts> = Arc::new(SystemAlerts);

    // Keyboard output lives on its own thread
    let typist = sotto::inject::spawn_typist();

    // Create the tray menu
    let tray_menu = Menu::new();
    let item_quit = MenuItem::new("Quit", true, None);
    let item_show_config = MenuItem::new("Show config path", true, None);

    let model_menu = Submenu::new("Model", true);
    let mut model_items: Vec<(CheckMenuItem, WhisperModel)> = Vec::new();
    {
        let current = config.read().model.clone();
        for model in WhisperModel::ALL {
            let item = CheckMenuItem::new(
                format!("{} ({})", model.name(), model.size_human()),
                true,
                model.name() == current,
                None,
            );
            model_menu.append(&item)?;
            model_items.push((item, model));
        }
    }

    let device_menu = Submenu::new("Microphone", true);
    let mut device_items: Vec<(CheckMenuItem, Option<usize>)> = Vec::new();
    {
        let current = config.read().microphone_device;
        let item = CheckMenuItem::new("Default", true, current.is_none(), None);
        device_menu.append(&item)?;
        device_items.push((item, None));

        for (index, name) in input_device_names().into_iter().enumerate() {
            let item = CheckMenuItem::new(menu_label(&name), true, current == Some(index), None);
            device_menu.append(&item)?;
            device_items.push((item, Some(index)));
        }
    }

    tray_menu.append_items(&[
        // the name of the app
        &MenuItem::new("Sotto", false, None),
        &PredefinedMenuItem::separator(),
        &PredefinedMenuItem::about(
            None,
            Some(
                AboutMetadataBuilder::new()
                    .version(Some(VERSION.to_owned()))
                    .build(),
            ),
        ),
        &item_show_config,
        &PredefinedMenuItem::separator(),
        &model_menu,
        &device_menu,
        &PredefinedMenuItem::separator(),
        &item_quit,
    ])?;

    // Set up the event loop
    let mut icon_tray = None;

    let menu_channel = MenuEvent::receiver();
    let tray_channel = TrayIconEvent::receiver();

    let event_loop: EventLoop<SottoEvent> = EventLoopBuilder::with_user_event().build();
    let event_sender = event_loop.create_proxy();

    // Transcription pipeline; downloads and loads the model, so a model
    // that cannot be resolved ends the program here
    let pipeline = Arc::new(TranscribePipeline::new(
        config.clone(),
        alerts.clone(),
        Box::new(event_sender.clone()),
        typist,
    )?);

    let controller = SettingsController::new(
        config.clone(),
        config_manager,
        combo.clone(),
        pipeline.clone(),
        alerts.clone(),
    );

    // Push-to-talk listener; owns the capture session and feeds the
    // pipeline until escape ends the session
    let _listener = hotkey::spawn_listener(combo, config, pipeline, alerts.clone(), event_sender);

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        if let Event::NewEvents(StartCause::Init) = event {
            // We create the icon once the event loop is actually running
            // to prevent issues like https://github.com/tauri-apps/tray-icon/issues/90

            icon_tray.replace(
                TrayIconBuilder::new()
                    .with_menu(Box::new(tray_menu.clone()))
                    .with_tooltip(MicState::Idle.tooltip())
                    .with_icon(MicState::Idle.icon())
                    .build()
                    .unwrap(),
            );

            // We have to request a redraw here to have the icon actually show up.
            // Tao only exposes a redraw method on the Window so we use core-foundation directly.
            #[cfg(target_os = "macos")]
            unsafe {
                use core_foundation::runloop::{CFRunLoopGetMain, CFRunLoopWakeUp};

                let rl = CFRunLoopGetMain();
                CFRunLoopWakeUp(rl);
            }

            info!("Sotto ready");
        }

        if let Ok(menu_event) = menu_channel.try_recv() {
            if menu_event.id == item_quit.id() {
                controller.on_exit();
                icon_tray.take();
                *control_flow = ControlFlow::Exit;
            } else if menu_event.id == item_show_config.id() {
                alerts.notify(
                    "Config path",
                    &controller.config_path().display().to_string(),
                );
            } else if let Some((_, model)) =
                model_items.iter().find(|(item, _)| menu_event.id == item.id())
            {
                controller.on_model_select(*model);
                for (item, tier) in &model_items {
                    item.set_checked(tier == model);
                }
            } else if let Some((_, device)) =
                device_items.iter().find(|(item, _)| menu_event.id == item.id())
            {
                controller.on_device_select(*device);
                for (item, index) in &device_items {
                    item.set_checked(index == device);
                }
            }
        }

        #[expect(clippy::redundant_pattern_matching)]
        if let Ok(_) = tray_channel.try_recv() {
            // Handle tray icon events
        }

        // Handle user provided events
        if let Event::UserEvent(event) = event {
            match event {
                SottoEvent::StateChanged(state) => {
                    info!(state = ?state, "State changed");
                    if let Some(tray) = icon_tray.as_ref() {
                        if let Err(e) = tray.set_icon(Some(state.icon())) {
                            warn!("Failed to update tray icon: {}", e);
                        }
                        if let Err(e) = tray.set_tooltip(Some(state.tooltip())) {
                            warn!("Failed to update tray tooltip: {}", e);
                        }
                    }
                }
                SottoEvent::ListenerEnded => {
                    info!("Listener session over, shutting down");
                    icon_tray.take();
                    *control_flow = ControlFlow::Exit;
                }
            }
        }
    });
}

/// Truncates long device names so the menu stays readable.
fn menu_label(name: &str) -> String {
    const MAX_CHARS: usize = 40;
    if name.chars().count() > MAX_CHARS {
        let head: String = name.chars().take(MAX_CHARS - 3).collect();
        format!("{head}...")
    } else {
        name.to_string()
    }
}
