#[cfg(test)]
mod tests {
    use crate::api::{transpile, TranspileOptions};
    use crate::errors::CompileError;
    use crate::wrappers::Format;

    fn options(format: Format, strict: bool) -> TranspileOptions<'static> {
        let mut options = TranspileOptions::new(format);
        options.output.strict = strict;
        options
    }

    fn cjs(source: &str, strict: bool) -> String {
        transpile(source, &options(Format::Cjs, strict)).unwrap().code
    }

    #[test]
    fn test_default_export_defaults_mode() {
        // S1
        let code = cjs("export default 42;", false);
        assert_eq!(code, "'use strict';\n\nmodule.exports = 42;\n");
    }

    #[test]
    fn test_reassignment_mirroring() {
        // S2
        let code = cjs("export var x = 1;\nx = 2;\nx++;\n", true);
        assert_eq!(
            code,
            "'use strict';\n\nvar x = 1;\nexports.x = x = 2;\nx++, exports.x = x;\n"
        );
    }

    #[test]
    fn test_update_inside_declarator_is_captured() {
        let code = cjs("export var x = 1;\nvar y = x++;\n", true);
        assert!(code.contains("var y = x++;"), "{code}");
        assert!(code.contains("exports.x = x;"), "{code}");
        // The mirror lands after the declaration, not inside it.
        assert!(!code.contains("x++,"), "{code}");
    }

    #[test]
    fn test_illegal_reassignment() {
        // S3
        let err = transpile(
            "import { x } from 'a';\nx = 1;\n",
            &options(Format::Cjs, true),
        )
        .unwrap_err();
        match err {
            CompileError::IllegalReassignment { name } => assert_eq!(name, "x"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_namespace_reassignment() {
        let err = transpile(
            "import * as ns from 'a';\nns.x = 1;\n",
            &options(Format::Cjs, true),
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::NamespaceReassignment { .. }));
    }

    #[test]
    fn test_round_trip_without_module_syntax() {
        let body = "var a = 1;\n\nfunction f() {\n\treturn a;\n}\n";
        let code = cjs(body, true);
        assert_eq!(code, format!("'use strict';\n\n{body}"));
    }

    #[test]
    fn test_named_imports_rewrite_to_member_access() {
        let code = cjs(
            "import { x } from './utils/math';\nexport var double = x * 2;\n",
            true,
        );
        assert!(code.contains("var math = require('./utils/math');"), "{code}");
        assert!(code.contains("var double = math.x * 2;"), "{code}");
        assert!(code.contains("exports.double = double;"), "{code}");
        assert!(!code.contains("import"), "{code}");
    }

    #[test]
    fn test_shadowed_references_untouched() {
        let code = cjs(
            "import { x } from './a';\nfunction f(x) { return x; }\nexport default f(x);\n",
            true,
        );
        assert!(code.contains("function f(x) { return x; }"), "{code}");
        assert!(code.contains("exports['default'] = f(a.x);"), "{code}");
    }

    #[test]
    fn test_shorthand_property_expands() {
        let code = cjs("import { x } from './a';\nexport var o = { x };\n", true);
        assert!(code.contains("{ x: a.x }"), "{code}");
    }

    #[test]
    fn test_default_import_binds_module() {
        let code = cjs("import thing from './thing';\nexport default thing;\n", false);
        assert!(code.contains("var thing = require('./thing');"), "{code}");
        assert!(code.contains("module.exports = thing;"), "{code}");
    }

    #[test]
    fn test_bare_import_side_effect() {
        let code = cjs("import './polyfill';\nexport default 1;\n", false);
        assert!(code.contains("require('./polyfill');"), "{code}");
        assert!(!code.contains("var"), "{code}");
    }

    #[test]
    fn test_duplicate_imports_require_once() {
        let code = cjs(
            "import { a } from './m';\nimport { b } from './m';\nexport default a + b;\n",
            true,
        );
        assert_eq!(code.matches("require('./m')").count(), 1, "{code}");
        assert!(code.contains("m.a + m.b"), "{code}");
    }

    #[test]
    fn test_named_default_function_export() {
        let code = cjs("export default function greet() { return 'hi'; }\n", false);
        assert!(code.contains("function greet() { return 'hi'; }"), "{code}");
        assert!(code.contains("module.exports = greet;"), "{code}");
    }

    #[test]
    fn test_named_default_reassignment_mirrors() {
        let code = cjs(
            "export default function greet() { return 'hi'; }\ngreet = null;\n",
            true,
        );
        assert!(code.contains("exports['default'] = greet = null;"), "{code}");
    }

    #[test]
    fn test_mirroring_skips_for_statement_headers() {
        let code = cjs("export var i = 0;\nfor (i = 1; i < 3; i++) {}\n", true);
        assert!(code.contains("for (exports.i = i = 1; i < 3; i++, exports.i = i) {}"), "{code}");
    }

    #[test]
    fn test_reexport_from_source() {
        let code = cjs("export { x as y } from './a';\n", true);
        assert!(code.contains("var a = require('./a');"), "{code}");
        assert!(code.contains("exports.y = a.x;"), "{code}");
        assert!(!code.contains("export {"), "{code}");
    }

    #[test]
    fn test_top_level_this_becomes_undefined() {
        let code = cjs("var self = this;\nexport default self;\n", false);
        assert!(code.contains("var self = undefined;"), "{code}");
    }

    #[test]
    fn test_arrow_this_becomes_undefined() {
        let code = cjs("export var f = () => this;\n", true);
        assert!(code.contains("() => undefined"), "{code}");
    }

    #[test]
    fn test_this_member_rejected() {
        let err = transpile("this.x = 1;\n", &options(Format::Cjs, false)).unwrap_err();
        assert!(matches!(err, CompileError::TopLevelThisMember));
    }

    #[test]
    fn test_defaults_mode_rejects_named_exports() {
        let err = transpile("export var x = 1;\n", &options(Format::Cjs, false)).unwrap_err();
        assert!(matches!(err, CompileError::StrictModeRequired));
    }

    #[test]
    fn test_defaults_mode_rejects_named_imports() {
        let err = transpile(
            "import { x } from './a';\nexport default x;\n",
            &options(Format::Cjs, false),
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::StrictModeRequired));
    }

    #[test]
    fn test_sourcemap_comment_stripped() {
        let code = cjs("export default 1;\n//# sourceMappingURL=in.js.map\n", false);
        assert!(!code.contains("sourceMappingURL"), "{code}");
    }

    // ── AMD ────────────────────────────────────────────────────────────────

    #[test]
    fn test_amd_strict_wrapper() {
        let code = transpile(
            "import { x } from './utils/math';\nexport var double = x * 2;\n",
            &options(Format::Amd, true),
        )
        .unwrap()
        .code;
        assert!(
            code.starts_with("define(['exports', './utils/math'], function (exports, math) {"),
            "{code}"
        );
        assert!(code.contains("\tvar double = math.x * 2;"), "{code}");
        assert!(code.contains("\texports.double = double;"), "{code}");
        assert!(code.trim_end().ends_with("});"), "{code}");
    }

    #[test]
    fn test_amd_defaults_returns() {
        let code = transpile("export default 42;", &options(Format::Amd, false))
            .unwrap()
            .code;
        assert!(code.starts_with("define([], function () {"), "{code}");
        assert!(code.contains("\treturn 42;"), "{code}");
    }

    #[test]
    fn test_amd_name_option() {
        let mut opts = options(Format::Amd, false);
        opts.output.amd_name = Some("answer".to_string());
        let code = transpile("export default 42;", &opts).unwrap().code;
        assert!(code.starts_with("define('answer', [], function () {"), "{code}");
    }

    #[test]
    fn test_absolute_paths_need_amd_name() {
        let mut opts = options(Format::Amd, false);
        opts.output.absolute_paths = true;
        let err = transpile("import a from './a';\nexport default a;\n", &opts).unwrap_err();
        assert!(matches!(err, CompileError::MissingAmdName));
    }

    #[test]
    fn test_absolute_paths_resolve_against_amd_name() {
        let mut opts = options(Format::Amd, false);
        opts.output.absolute_paths = true;
        opts.output.amd_name = Some("lib/mod".to_string());
        let code = transpile("import a from './a';\nexport default a;\n", &opts)
            .unwrap()
            .code;
        assert!(code.starts_with("define('lib/mod', ['lib/a'], function (a) {"), "{code}");
    }

    #[test]
    fn test_template_literal_survives_indentation() {
        let code = transpile(
            "var s = `a\nb`;\nexport default s;\n",
            &options(Format::Amd, false),
        )
        .unwrap()
        .code;
        assert!(code.contains("\tvar s = `a\nb`;"), "{code}");
        assert!(!code.contains("\nb`;\n\t\n"), "{code}");
        assert!(code.contains("\treturn s;"), "{code}");
    }

    // ── UMD ────────────────────────────────────────────────────────────────

    #[test]
    fn test_umd_requires_name() {
        let err = transpile("export default 42;", &options(Format::Umd, false)).unwrap_err();
        assert!(matches!(err, CompileError::MissingName));
    }

    #[test]
    fn test_umd_defaults_wrapper() {
        let mut opts = options(Format::Umd, false);
        opts.output.name = Some("Answer".to_string());
        let code = transpile("export default 42;", &opts).unwrap().code;
        assert!(code.contains("module.exports = factory()"), "{code}");
        assert!(code.contains("define([], factory)"), "{code}");
        assert!(code.contains("(global.Answer = factory())"), "{code}");
        assert!(code.contains("\treturn 42;"), "{code}");
    }

    #[test]
    fn test_umd_strict_wrapper_reads_globals() {
        let mut opts = options(Format::Umd, true);
        opts.output.name = Some("Lib".to_string());
        let code = transpile("import { x } from 'ext';\nexport var y = x;\n", &opts)
            .unwrap()
            .code;
        assert!(code.contains("factory(exports, require('ext'))"), "{code}");
        assert!(code.contains("define(['exports', 'ext'], factory)"), "{code}");
        assert!(code.contains("(factory((global.Lib = {}), global.ext))"), "{code}");
    }

    // ── Source maps ────────────────────────────────────────────────────────

    #[test]
    fn test_source_map_file() {
        let mut opts = options(Format::Cjs, false);
        opts.output.source_map = Some(crate::api::SourceMapKind::File);
        opts.output.source_map_file = Some("dist/out.js".to_string());
        opts.output.source_map_source = Some("main.js".to_string());
        let out = transpile("export default 42;", &opts).unwrap();
        let map = out.map.expect("map");
        assert_eq!(map.version, 3);
        assert_eq!(map.sources, vec!["main.js"]);
        assert!(!map.mappings.is_empty());
        assert!(out.code.ends_with("//# sourceMappingURL=out.js.map\n"), "{}", out.code);
    }

    #[test]
    fn test_source_map_inline() {
        let mut opts = options(Format::Cjs, false);
        opts.output.source_map = Some(crate::api::SourceMapKind::Inline);
        opts.output.source_map_file = Some("out.js".to_string());
        opts.output.source_map_source = Some("main.js".to_string());
        let out = transpile("export default 42;", &opts).unwrap();
        assert!(
            out.code.contains("sourceMappingURL=data:application/json;charset=utf-8;base64,"),
            "{}",
            out.code
        );
    }

    #[test]
    fn test_source_map_requires_source() {
        let mut opts = options(Format::Cjs, false);
        opts.output.source_map = Some(crate::api::SourceMapKind::File);
        opts.output.source_map_file = Some("out.js".to_string());
        let err = transpile("export default 42;", &opts).unwrap_err();
        assert!(matches!(err, CompileError::MissingSourceMapSource));
    }

    #[test]
    fn test_source_map_requires_file() {
        let mut opts = options(Format::Cjs, false);
        opts.output.source_map = Some(crate::api::SourceMapKind::File);
        opts.output.source_map_source = Some("main.js".to_string());
        let err = transpile("export default 42;", &opts).unwrap_err();
        assert!(matches!(err, CompileError::MissingSourceMapFile));
    }

    #[test]
    fn test_banner_and_footer() {
        let mut opts = options(Format::Cjs, false);
        opts.output.banner = Some("/* banner */".to_string());
        opts.output.footer = Some("/* footer */".to_string());
        let code = transpile("export default 42;", &opts).unwrap().code;
        assert!(code.starts_with("/* banner */\n'use strict';"), "{code}");
        assert!(code.ends_with("/* footer */\n"), "{code}");
    }
}
