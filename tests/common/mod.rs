#![allow(dead_code)]

pub mod project {
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// A configen project laid out in a temporary directory.
    pub struct Project {
        dir: TempDir,
    }

    impl Project {
        pub fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        pub fn root(&self) -> &Path {
            self.dir.path()
        }

        pub fn path(&self, rel: &str) -> PathBuf {
            self.dir.path().join(rel)
        }

        /// Write `body` to `rel`, creating parent directories.
        pub fn file(&self, rel: &str, body: &str) -> &Self {
            let path = self.path(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
            self
        }

        pub fn read(&self, rel: &str) -> String {
            fs::read_to_string(self.path(rel))
                .unwrap_or_else(|e| panic!("cannot read {rel}: {e}"))
        }

        pub fn exists(&self, rel: &str) -> bool {
            self.path(rel).exists()
        }

        /// Absolute path string, for options that take path templates.
        pub fn arg(&self, rel: &str) -> String {
            self.path(rel).display().to_string()
        }
    }

    impl Default for Project {
        fn default() -> Self {
            Self::new()
        }
    }

    /// A service project: one template, one schema, one values file.
    pub fn service() -> Project {
        let project = Project::new();
        project
            .file(
                "schemas/service.yaml",
                "$id: https://configen.test/service\n\
                 type: object\n\
                 required: [name, port]\n\
                 properties:\n  \
                   name: { type: string }\n  \
                   port: { $ref: \"https://configen.test/port\" }\n",
            )
            .file(
                "schemas/port.json",
                r#"{ "$id": "https://configen.test/port", "type": "integer", "minimum": 1, "maximum": 65535 }"#,
            )
            .file("values.yaml", "name: api\nport: 8080\n")
            .file(
                "templates/service.yaml",
                "$schema: https://configen.test/service\nname: {{ .Values.name }}-{{ .Env }}\nport: {{ .Values.port }}\n",
            );
        project
    }
}
