//! One-way event artifacts: host sender, preload subscriptions and the
//! renderer event service.

use std::path::Path;

use super::{all_events, block, file, payload_type, ImportSet, PascalNames};
use crate::model::EventPackageInfo;

/// `createEventSender(target)` with one push method per event.
pub fn generate_event_sender(packages: &[EventPackageInfo], out_dir: &Path) -> String {
    let mut imports = ImportSet::new(out_dir);
    imports.module_type("electron", "WebContents");

    let mut methods = String::new();
    for (path, event) in all_events(packages) {
        let payload = payload_type(&mut imports, path, event);
        methods.push_str(&format!(
            "    {name}: (payload: {payload}): void => {{\n      \
             target.send('{name}', payload);\n    \
             }},\n",
            name = event.name
        ));
    }

    let mut body = String::new();
    if methods.is_empty() {
        body.push_str("export function createEventSender(_target: WebContents) {\n  return {};\n}\n");
    } else {
        body.push_str("export function createEventSender(target: WebContents) {\n  return {\n");
        body.push_str(&methods);
        body.push_str("  };\n}\n");
    }
    body.push_str("\nexport type EventSender = ReturnType<typeof createEventSender>;\n");

    file(&imports, &body)
}

/// Preload `events` table: subscribe returns an unsubscribe closure.
pub fn generate_preload_events(packages: &[EventPackageInfo], out_dir: &Path) -> String {
    let mut imports = ImportSet::new(out_dir);
    imports.module_value("electron", "contextBridge");

    let mut methods = String::new();
    for (path, event) in all_events(packages) {
        imports.module_value("electron", "ipcRenderer");
        imports.module_type("electron", "IpcRendererEvent");
        let payload = payload_type(&mut imports, path, event);
        methods.push_str(&format!(
            "  {name}: (listener: (payload: {payload}) => void): (() => void) => {{\n    \
             const handler = (_event: IpcRendererEvent, payload: {payload}) => listener(payload);\n    \
             ipcRenderer.on('{name}', handler);\n    \
             return () => {{\n      \
             ipcRenderer.removeListener('{name}', handler);\n    \
             }};\n  \
             }},\n",
            name = event.name
        ));
    }

    let mut body = String::new();
    if methods.is_empty() {
        body.push_str("export const events = {};\n");
    } else {
        body.push_str("export const events = {\n");
        body.push_str(&methods);
        body.push_str("};\n");
    }
    body.push_str("\nexport type Events = typeof events;\n");
    body.push_str("\nexport function exposeEvents(): void {\n");
    body.push_str("  contextBridge.exposeInMainWorld('events', events);\n");
    body.push_str("}\n");

    file(&imports, &body)
}

/// Renderer `EventService` with `on<Name>` methods over `window.events`.
pub fn generate_renderer_events(packages: &[EventPackageInfo], out_dir: &Path) -> String {
    let mut imports = ImportSet::new(out_dir);
    let mut table = String::new();
    let mut interface = String::new();
    let mut class = String::new();
    let mut taken = PascalNames::default();

    for (path, event) in all_events(packages) {
        let payload = payload_type(&mut imports, path, event);
        let listener = format!("listener: (payload: {payload}) => void");
        let method = format!("on{}", taken.claim(&event.name));

        table.push_str(&format!("  {}({listener}): () => void;\n", event.name));
        interface.push_str(&format!("  {method}({listener}): () => void;\n"));
        class.push_str(&format!(
            "  {method}({listener}): () => void {{\n    \
             return window.events.{}(listener);\n  \
             }}\n",
            event.name
        ));
    }

    let mut body = String::new();
    body.push_str(&block("export interface IpcEvents", &table));
    body.push_str("\ndeclare global {\n  interface Window {\n    events: IpcEvents;\n  }\n}\n");
    body.push_str(&block("export interface EventService", &interface));
    body.push_str(&block("export class EventServiceImpl implements EventService", &class));
    body.push_str("\nexport const eventService: EventService = new EventServiceImpl();\n");

    file(&imports, body.trim_start_matches('\n'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::fixtures;

    #[test]
    fn test_sender_pushes_each_event() {
        let output = generate_event_sender(&fixtures::events(), Path::new("/app/src/main/ipc"));

        assert_eq!(
            output,
            "// auto generated by ipcgen, do not edit\n\
             \n\
             import type { WebContents } from 'electron';\n\
             import type { User } from '../types';\n\
             import type { Tick } from '../events';\n\
             \n\
             export function createEventSender(target: WebContents) {\n  \
             return {\n    \
             UserUpdated: (payload: User): void => {\n      \
             target.send('UserUpdated', payload);\n    \
             },\n    \
             Tick: (payload: Parameters<Tick>[0]): void => {\n      \
             target.send('Tick', payload);\n    \
             },\n  \
             };\n\
             }\n\
             \n\
             export type EventSender = ReturnType<typeof createEventSender>;\n"
        );
    }

    #[test]
    fn test_preload_subscription_returns_unsubscribe() {
        let output = generate_preload_events(&fixtures::events(), Path::new("/app/src/preload"));

        assert!(output.contains(
            "import { contextBridge, ipcRenderer, type IpcRendererEvent } from 'electron';\n"
        ));
        assert!(output.contains(
            "  UserUpdated: (listener: (payload: User) => void): (() => void) => {\n    \
             const handler = (_event: IpcRendererEvent, payload: User) => listener(payload);\n    \
             ipcRenderer.on('UserUpdated', handler);\n    \
             return () => {\n      \
             ipcRenderer.removeListener('UserUpdated', handler);\n    \
             };\n  \
             },\n"
        ));
        assert!(output.contains("contextBridge.exposeInMainWorld('events', events);"));
    }

    #[test]
    fn test_renderer_service_methods() {
        let output = generate_renderer_events(&fixtures::events(), Path::new("/app/src/renderer/ipc"));

        assert!(output.contains("import type { User } from '../../main/types';\n"));
        assert!(output.contains("  UserUpdated(listener: (payload: User) => void): () => void;\n"));
        assert!(output.contains("  onUserUpdated(listener: (payload: User) => void): () => void;\n"));
        assert!(output.contains(
            "  onTick(listener: (payload: Parameters<Tick>[0]) => void): () => void {\n    \
             return window.events.Tick(listener);\n  \
             }\n"
        ));
        assert!(output.contains("    events: IpcEvents;\n"));
    }

    #[test]
    fn test_renderer_methods_stay_unique() {
        let mut packages = fixtures::events();
        let mut twin = packages[0].events[0].clone();
        twin.name = "userUpdated".to_string();
        packages[0].events.push(twin);

        let output = generate_renderer_events(&packages, Path::new("/app/src/renderer/ipc"));

        assert!(output.contains("  onUserUpdated(listener: (payload: User) => void): () => void;\n"));
        assert!(output.contains("  onUserUpdated2(listener: (payload: User) => void): () => void;\n"));
        assert!(output.contains("    return window.events.userUpdated(listener);\n"));
    }

    #[test]
    fn test_empty_event_artifacts_are_valid() {
        let sender = generate_event_sender(&[], Path::new("/app/src/main/ipc"));
        assert!(sender.contains("export function createEventSender(_target: WebContents) {\n  return {};\n}\n"));

        let preload = generate_preload_events(&[], Path::new("/app/src/preload"));
        assert!(preload.contains("export const events = {};\n"));
        assert!(!preload.contains("ipcRenderer"));

        let renderer = generate_renderer_events(&[], Path::new("/app/src/renderer/ipc"));
        assert!(renderer.starts_with("// auto generated by ipcgen, do not edit\n\nexport interface IpcEvents {}\n"));
        assert!(renderer.contains("export class EventServiceImpl implements EventService {}\n"));
    }
}
