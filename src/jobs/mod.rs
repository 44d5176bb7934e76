pub mod settings_watcher;
