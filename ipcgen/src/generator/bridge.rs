use std::path::Path;

use super::{file, functions, is_identifier, request_type, ImportSet};
use crate::model::{FunctionEntry, PackageInfo};

/// Preload bridge: one `ipcRenderer.invoke` forwarder per function.
pub fn generate_bridge(packages: &[PackageInfo], out_dir: &Path) -> String {
    let mut imports = ImportSet::new(out_dir);
    imports.module_value("electron", "contextBridge");

    let mut methods = String::new();
    for (_, entry) in functions(packages) {
        imports.module_value("electron", "ipcRenderer");
        imports.type_imports(entry.type_imports());
        methods.push_str(&format!("  {}: {},\n", entry.name, forwarder(entry)));
    }

    let mut body = String::new();
    if methods.is_empty() {
        body.push_str("export const api = {};\n");
    } else {
        body.push_str("export const api = {\n");
        body.push_str(&methods);
        body.push_str("};\n");
    }
    body.push_str("\nexport type Api = typeof api;\n");
    body.push_str("\nexport function exposeApi(): void {\n");
    body.push_str("  contextBridge.exposeInMainWorld('api', api);\n");
    body.push_str("}\n");

    file(&imports, &body)
}

fn forwarder(entry: &FunctionEntry) -> String {
    let channel = &entry.name;
    if entry.request.is_empty() {
        return format!("() => ipcRenderer.invoke('{channel}', {{}})");
    }

    let ty = request_type(&entry.request);
    if entry.request.iter().all(|field| is_identifier(&field.name)) {
        let names: Vec<&str> = entry.request.iter().map(|f| f.name.as_str()).collect();
        let names = names.join(", ");
        format!("({{ {names} }}: {ty}) => ipcRenderer.invoke('{channel}', {{ {names} }})")
    } else {
        format!("(args: {ty}) => ipcRenderer.invoke('{channel}', args)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::fixtures;
    use crate::model::ResolvedField;
    use std::path::PathBuf;

    #[test]
    fn test_bridge_forwards_flattened_fields() {
        let output = generate_bridge(&fixtures::packages(), Path::new("/app/src/preload"));

        assert_eq!(
            output,
            "// auto generated by ipcgen, do not edit\n\
             \n\
             import { contextBridge, ipcRenderer } from 'electron';\n\
             import type { Role } from '../main/types';\n\
             \n\
             export const api = {\n  \
             createUser: ({ name, email, role }: { name: string; email?: string | undefined; role: Role }) => ipcRenderer.invoke('createUser', { name, email, role }),\n  \
             getUser: ({ id }: { id: string }) => ipcRenderer.invoke('getUser', { id }),\n  \
             ping: () => ipcRenderer.invoke('ping', {}),\n\
             };\n\
             \n\
             export type Api = typeof api;\n\
             \n\
             export function exposeApi(): void {\n  \
             contextBridge.exposeInMainWorld('api', api);\n\
             }\n"
        );
    }

    #[test]
    fn test_bridge_passes_bag_for_non_identifier_fields() {
        let mut entry = FunctionEntry::new("setHeader");
        entry.request = vec![ResolvedField::new("content-type", "string")];
        let packages = vec![PackageInfo {
            path: PathBuf::from("/app/src/main/api/http.ts"),
            func: vec![entry],
        }];

        let output = generate_bridge(&packages, Path::new("/app/src/preload"));

        assert!(output.contains(
            "setHeader: (args: { 'content-type': string }) => ipcRenderer.invoke('setHeader', args),"
        ));
    }

    #[test]
    fn test_empty_bridge_is_valid() {
        let output = generate_bridge(&[], Path::new("/app/src/preload"));

        assert!(output.contains("import { contextBridge } from 'electron';"));
        assert!(output.contains("export const api = {};"));
        assert!(!output.contains("ipcRenderer"));
        assert!(output.contains("contextBridge.exposeInMainWorld('api', api);"));
    }
}
