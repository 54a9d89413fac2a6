use log::{debug, info, trace};
use serde_json::Value;

use crate::config::{TransformerContext, builtin};
use crate::descriptor::{load_opcode, parse_method_descriptor, return_opcode, slot_size};
use crate::error::Result;
use crate::ir::{ClassUnit, Method};
use crate::opcodes::{self, ACC_FINAL, ACC_PUBLIC, ACC_STATIC, V1_8};
use crate::transform::{Diagnostic, OutputSink, Transformer, TransformerMetadata};
use crate::writer::{ClassWriter, MethodWriter};

pub(crate) const EXPECT_PLATFORM: &str = "Ldev/architectury/annotations/ExpectPlatform;";
pub(crate) const EXPECT_PLATFORM_LEGACY: &str = "Lme/shedaniel/architectury/ExpectPlatform;";
pub(crate) const EXPECT_PLATFORM_LEGACY2: &str = "Lme/shedaniel/architectury/PlatformOnly;";
pub(crate) const EXPECT_PLATFORM_TRANSFORMED: &str =
    "Ldev/architectury/annotations/ExpectPlatform$Transformed;";

const RULE_ID: &str = "EXPECT_PLATFORM";
const LEGACY_PLATFORM_METHODS: &str = "me/shedaniel/architectury/PlatformMethods";
const PLATFORM_METHODS: &str = "PlatformMethods";
const GET_CURRENT_TARGET: &str = "getCurrentTarget";
const GET_CURRENT_TARGET_DESCRIPTOR: &str = "()Ljava/lang/String;";

/// Recognized marker annotations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MarkerKind {
    /// Legacy marker, looked up in the visible annotation list.
    Legacy,
    /// Current marker, looked up in the invisible annotation list.
    Current,
    /// Second legacy marker, looked up in the invisible annotation list.
    LegacyPlatformOnly,
    /// Stamped on every rewritten method.
    Transformed,
}

impl MarkerKind {
    pub(crate) fn descriptor(self) -> &'static str {
        match self {
            MarkerKind::Legacy => EXPECT_PLATFORM_LEGACY,
            MarkerKind::Current => EXPECT_PLATFORM,
            MarkerKind::LegacyPlatformOnly => EXPECT_PLATFORM_LEGACY2,
            MarkerKind::Transformed => EXPECT_PLATFORM_TRANSFORMED,
        }
    }
}

/// First recognized marker on `method`, in priority order.
pub(crate) fn detect_marker(method: &Method) -> Option<MarkerKind> {
    if method.has_visible_annotation(MarkerKind::Legacy.descriptor()) {
        Some(MarkerKind::Legacy)
    } else if method.has_invisible_annotation(MarkerKind::Current.descriptor()) {
        Some(MarkerKind::Current)
    } else if method.has_invisible_annotation(MarkerKind::LegacyPlatformOnly.descriptor()) {
        Some(MarkerKind::LegacyPlatformOnly)
    } else {
        None
    }
}

/// Rewrites `@ExpectPlatform` methods into static calls on the per-platform
/// implementation class and emits the `PlatformMethods` helper class.
#[derive(Clone, Debug, Default)]
pub(crate) struct ExpectPlatform {
    platform_package: Option<String>,
    unique_identifier: Option<String>,
}

impl ExpectPlatform {
    fn unique_identifier<'a>(&'a self, context: &'a TransformerContext) -> &'a str {
        self.unique_identifier
            .as_deref()
            .unwrap_or_else(|| context.unique_identifier())
    }

    fn helper_class_name(&self, context: &TransformerContext) -> String {
        format!("{}/{PLATFORM_METHODS}", self.unique_identifier(context))
    }

    fn helper_path(&self, marker: MarkerKind, context: &TransformerContext) -> String {
        match marker {
            MarkerKind::Legacy => LEGACY_PLATFORM_METHODS.to_string(),
            _ => self.helper_class_name(context),
        }
    }

    /// Replace the body of `method` with a forwarding call. Returns `false`
    /// when the method is not static; that case is reported, not repaired.
    fn rewrite_method(
        &self,
        context: &TransformerContext,
        owner: &str,
        method: &mut Method,
    ) -> Result<bool> {
        if !method.is_static() {
            context.error(Diagnostic {
                rule_id: RULE_ID,
                class_name: owner.to_string(),
                method_name: method.name.clone(),
                descriptor: method.descriptor.clone(),
                message: format!(
                    "@ExpectPlatform can only apply to static methods: {owner}.{}{}",
                    method.name, method.descriptor
                ),
            });
            return Ok(false);
        }

        let descriptor = parse_method_descriptor(&method.descriptor)?;
        let slug = platform_slug(self.platform_package.as_deref(), context)?;
        let target = resolve_target(owner, &slug);
        let name = method.name.clone();
        let method_descriptor = method.descriptor.clone();

        method.code_mut().clear();
        let mut body = MethodWriter::new(method);
        let mut slot = 0;
        for parameter in descriptor.parameter_types() {
            body.visit_var_insn(load_opcode(parameter), slot);
            slot += slot_size(parameter);
        }
        body.visit_method_insn(
            opcodes::INVOKESTATIC,
            &target,
            &name,
            &method_descriptor,
            false,
        );
        body.visit_insn(return_opcode(descriptor.return_type()));
        body.visit_annotation(MarkerKind::Transformed.descriptor(), false);
        Ok(true)
    }
}

impl Transformer for ExpectPlatform {
    fn metadata(&self) -> TransformerMetadata {
        TransformerMetadata {
            id: RULE_ID,
            name: "Expect platform",
            description: "Forwards @ExpectPlatform methods to per-platform implementation classes",
        }
    }

    fn supply_properties(&mut self, properties: &Value) {
        let string = |key: &str| {
            properties
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        self.platform_package = string(builtin::PLATFORM_PACKAGE);
        self.unique_identifier = string(builtin::UNIQUE_IDENTIFIER);
    }

    fn edit_class(
        &self,
        context: &TransformerContext,
        name: &str,
        class: &mut ClassUnit,
    ) -> Result<bool> {
        if !context.is_inject_injectables() {
            return Ok(false);
        }
        let mut changed = false;
        for method in &mut class.methods {
            let Some(marker) = detect_marker(method) else {
                continue;
            };
            if method.has_invisible_annotation(MarkerKind::Transformed.descriptor()) {
                trace!("{name}.{}{} already transformed", method.name, method.descriptor);
                continue;
            }
            debug!(
                "rewriting {name}.{}{} ({marker:?}, helper {})",
                method.name,
                method.descriptor,
                self.helper_path(marker, context)
            );
            changed |= self.rewrite_method(context, &class.name, method)?;
        }
        Ok(changed)
    }

    fn edit_assets(
        &self,
        context: &TransformerContext,
        output: &mut dyn OutputSink,
    ) -> Result<()> {
        if !context.is_inject_injectables() {
            return Ok(());
        }
        let class_name = self.helper_class_name(context);
        let bytes = build_platform_methods_class(context, &class_name)?;
        info!("emitting {class_name}");
        output.add_class(&class_name, bytes)?;
        Ok(())
    }
}

/// Package segment naming the platform: explicit value, then the
/// platform-package property, then the platform name (`quilt` reads as `fabric`).
pub(crate) fn platform_slug(
    explicit: Option<&str>,
    context: &TransformerContext,
) -> Result<String> {
    if let Some(package) = explicit.or_else(|| context.property(builtin::PLATFORM_PACKAGE)) {
        return Ok(package.to_string());
    }
    let platform = context.platform_name()?;
    Ok(if platform == "quilt" {
        "fabric".to_string()
    } else {
        platform.to_string()
    })
}

/// Implementation class for `owner` on the platform `slug`:
/// `a/b/C$D` on `fabric` becomes `a/b/fabric/CDImpl`.
pub(crate) fn resolve_target(owner: &str, slug: &str) -> String {
    let lookup = format!("{}Impl", owner.replace('$', ""));
    match lookup.rsplit_once('/') {
        Some((parent, simple)) => format!("{parent}/{slug}/{simple}"),
        None => format!("{slug}/{lookup}"),
    }
}

/// Emit `public final class <name>` whose static `getCurrentTarget()` returns the platform name.
pub(crate) fn build_platform_methods_class(
    context: &TransformerContext,
    class_name: &str,
) -> Result<Vec<u8>> {
    let platform = context.platform_name()?;

    let mut writer = ClassWriter::new();
    writer.visit(V1_8, ACC_PUBLIC | ACC_FINAL, class_name, Some("java/lang/Object"));
    let mut method = writer.visit_method(
        ACC_PUBLIC | ACC_STATIC,
        GET_CURRENT_TARGET,
        GET_CURRENT_TARGET_DESCRIPTOR,
    );
    method.visit_ldc_insn(platform);
    method.visit_insn(opcodes::ARETURN);
    writer.to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Properties;
    use crate::constant_pool::Constant;
    use crate::error::Error;
    use crate::ir::{ExceptionHandler, Instruction, RawAttribute};
    use crate::reader::read_class;
    use crate::sink::MemorySink;
    use crate::writer::write_class;
    use serde_json::json;

    fn context_with(entries: &[(&str, &str)]) -> TransformerContext {
        let mut properties = Properties::default();
        for (key, value) in entries {
            properties.set(key, *value);
        }
        TransformerContext::new(properties, "architectury_inject_test")
    }

    fn fabric() -> TransformerContext {
        context_with(&[(builtin::PLATFORM_NAME, "fabric")])
    }

    /// Class with a single method whose body is `throw null`.
    fn stub_bytes(
        owner: &str,
        access: u16,
        name: &str,
        descriptor: &str,
        marker: Option<(&str, bool)>,
    ) -> Vec<u8> {
        let mut writer = ClassWriter::new();
        writer.visit(V1_8, ACC_PUBLIC, owner, Some("java/lang/Object"));
        let mut method = writer.visit_method(access, name, descriptor);
        if let Some((annotation, visible)) = marker {
            method.visit_annotation(annotation, visible);
        }
        method.visit_insn(opcodes::ACONST_NULL);
        method.visit_insn(opcodes::ATHROW);
        method.visit_maxs(1, 8);
        writer.to_bytes().expect("write stub class")
    }

    fn stub_class(
        owner: &str,
        access: u16,
        name: &str,
        descriptor: &str,
        marker: Option<(&str, bool)>,
    ) -> ClassUnit {
        read_class(&stub_bytes(owner, access, name, descriptor, marker)).expect("read stub class")
    }

    fn instructions(class: &ClassUnit) -> &[Instruction] {
        &class.methods[0]
            .code
            .as_ref()
            .expect("code attribute")
            .instructions
    }

    fn invoke(owner: &str, name: &str, descriptor: &str) -> Instruction {
        Instruction::Method {
            opcode: opcodes::INVOKESTATIC,
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            interface: false,
        }
    }

    #[test]
    fn static_method_forwards_parameters_to_platform_impl() {
        let mut class = stub_class(
            "com/example/Foo",
            ACC_PUBLIC | ACC_STATIC,
            "bar",
            "(IJ)V",
            Some((EXPECT_PLATFORM, false)),
        );

        let changed = ExpectPlatform::default()
            .edit_class(&fabric(), "com/example/Foo", &mut class)
            .expect("edit class");

        assert!(changed);
        assert_eq!(
            vec![
                Instruction::Var {
                    opcode: opcodes::ILOAD,
                    index: 0
                },
                Instruction::Var {
                    opcode: opcodes::LLOAD,
                    index: 1
                },
                invoke("com/example/fabric/FooImpl", "bar", "(IJ)V"),
                Instruction::Insn(opcodes::RETURN),
            ],
            instructions(&class)
        );
        assert!(class.methods[0].has_invisible_annotation(EXPECT_PLATFORM_TRANSFORMED));
    }

    #[test]
    fn rewritten_class_serializes_with_recomputed_maxs() {
        let mut class = stub_class(
            "com/example/Foo",
            ACC_PUBLIC | ACC_STATIC,
            "bar",
            "(IJ)V",
            Some((EXPECT_PLATFORM, false)),
        );
        ExpectPlatform::default()
            .edit_class(&fabric(), "com/example/Foo", &mut class)
            .expect("edit class");

        let bytes = write_class(&class).expect("write class");
        jclassfile::class_file::parse(&bytes).expect("independent parser accepts output");
        let reread = read_class(&bytes).expect("read class");

        let code = reread.methods[0].code.as_ref().expect("code");
        assert_eq!(Some(3), code.max_stack);
        assert_eq!(Some(3), code.max_locals);
        assert!(code.exception_table.is_empty());
        let emitted: Vec<u8> = code.instructions.iter().map(Instruction::opcode).collect();
        assert_eq!(vec![0x1a, 0x1f, opcodes::INVOKESTATIC, opcodes::RETURN], emitted);
        assert!(reread.methods[0].has_invisible_annotation(EXPECT_PLATFORM));
        assert!(reread.methods[0].has_invisible_annotation(EXPECT_PLATFORM_TRANSFORMED));
    }

    #[test]
    fn replaced_body_drops_handlers_and_offset_attributes() {
        let mut class = stub_class(
            "com/example/Foo",
            ACC_PUBLIC | ACC_STATIC,
            "bar",
            "(I)V",
            Some((EXPECT_PLATFORM, false)),
        );
        let line_numbers = class
            .constant_pool
            .add_utf8("LineNumberTable")
            .expect("add utf8");
        let stack_map = class
            .constant_pool
            .add_utf8("StackMapTable")
            .expect("add utf8");
        let code = class.methods[0].code_mut();
        code.exception_table.push(ExceptionHandler {
            start_pc: 0,
            end_pc: 1,
            handler_pc: 1,
            catch_type: 0,
        });
        code.attributes.push(RawAttribute {
            name_index: line_numbers,
            info: vec![0, 1, 0, 0, 0, 7],
        });
        code.attributes.push(RawAttribute {
            name_index: stack_map,
            info: vec![0, 0],
        });
        let mut class = read_class(&write_class(&class).expect("write stub")).expect("read stub");
        let before = class.methods[0].code.as_ref().expect("code");
        assert_eq!(1, before.exception_table.len());
        assert_eq!(2, before.attributes.len());

        ExpectPlatform::default()
            .edit_class(&fabric(), "com/example/Foo", &mut class)
            .expect("edit class");
        let bytes = write_class(&class).expect("write class");

        jclassfile::class_file::parse(&bytes).expect("independent parser accepts output");
        let reread = read_class(&bytes).expect("read class");
        let code = reread.methods[0].code.as_ref().expect("code");
        assert!(code.exception_table.is_empty());
        assert!(code.attributes.is_empty());
        assert_eq!(3, code.instructions.len());
    }

    #[test]
    fn nested_class_on_quilt_targets_flattened_fabric_impl() {
        let mut class = stub_class(
            "com/example/Foo$Bar",
            ACC_PUBLIC | ACC_STATIC,
            "run",
            "()V",
            Some((EXPECT_PLATFORM, false)),
        );
        let context = context_with(&[(builtin::PLATFORM_NAME, "quilt")]);

        ExpectPlatform::default()
            .edit_class(&context, "com/example/Foo$Bar", &mut class)
            .expect("edit class");

        assert_eq!(
            invoke("com/example/fabric/FooBarImpl", "run", "()V"),
            instructions(&class)[0]
        );
    }

    #[test]
    fn platform_package_property_overrides_platform_name() {
        let mut class = stub_class(
            "com/example/Foo",
            ACC_PUBLIC | ACC_STATIC,
            "run",
            "()V",
            Some((EXPECT_PLATFORM, false)),
        );
        let context = context_with(&[
            (builtin::PLATFORM_NAME, "forge"),
            (builtin::PLATFORM_PACKAGE, "neoforge"),
        ]);

        ExpectPlatform::default()
            .edit_class(&context, "com/example/Foo", &mut class)
            .expect("edit class");

        assert_eq!(
            invoke("com/example/neoforge/FooImpl", "run", "()V"),
            instructions(&class)[0]
        );
    }

    #[test]
    fn supplied_platform_package_wins_over_context() {
        let mut transformer = ExpectPlatform::default();
        transformer.supply_properties(&json!({ "architectury.platform.package": "custom" }));
        let context = context_with(&[
            (builtin::PLATFORM_NAME, "forge"),
            (builtin::PLATFORM_PACKAGE, "neoforge"),
        ]);

        assert_eq!(
            "custom",
            platform_slug(transformer.platform_package.as_deref(), &context).expect("slug")
        );
    }

    #[test]
    fn reference_return_uses_areturn() {
        let mut class = stub_class(
            "com/example/Foo",
            ACC_PUBLIC | ACC_STATIC,
            "baz",
            "()Ljava/lang/String;",
            Some((EXPECT_PLATFORM, false)),
        );

        ExpectPlatform::default()
            .edit_class(&fabric(), "com/example/Foo", &mut class)
            .expect("edit class");

        assert_eq!(
            vec![
                invoke("com/example/fabric/FooImpl", "baz", "()Ljava/lang/String;"),
                Instruction::Insn(opcodes::ARETURN),
            ],
            instructions(&class)
        );
    }

    #[test]
    fn wide_parameters_advance_two_slots() {
        let descriptor = "(DLjava/lang/Object;[IFZ)J";
        let mut class = stub_class(
            "com/example/Foo",
            ACC_STATIC,
            "mix",
            descriptor,
            Some((EXPECT_PLATFORM, false)),
        );

        ExpectPlatform::default()
            .edit_class(&fabric(), "com/example/Foo", &mut class)
            .expect("edit class");

        let loads: Vec<(u8, u16)> = instructions(&class)
            .iter()
            .filter_map(|instruction| match instruction {
                Instruction::Var { opcode, index } => Some((*opcode, *index)),
                _ => None,
            })
            .collect();
        assert_eq!(
            vec![
                (opcodes::DLOAD, 0),
                (opcodes::ALOAD, 2),
                (opcodes::ALOAD, 3),
                (opcodes::FLOAD, 4),
                (opcodes::ILOAD, 5),
            ],
            loads
        );
        assert_eq!(7, instructions(&class).len());
        assert_eq!(
            Some(&Instruction::Insn(opcodes::LRETURN)),
            instructions(&class).last()
        );
    }

    #[test]
    fn instance_method_is_reported_and_left_alone() {
        let mut class = stub_class(
            "com/example/Foo",
            ACC_PUBLIC,
            "bar",
            "()V",
            Some((EXPECT_PLATFORM, false)),
        );
        let before = class.methods[0].clone();
        let context = fabric();

        let changed = ExpectPlatform::default()
            .edit_class(&context, "com/example/Foo", &mut class)
            .expect("edit class");

        assert!(!changed);
        assert_eq!(before, class.methods[0]);
        let diagnostics = context.diagnostics();
        assert_eq!(1, diagnostics.len());
        assert!(diagnostics[0].message.contains("static"));
        assert!(diagnostics[0].message.contains("bar"));
        assert_eq!("com/example/Foo", diagnostics[0].class_name);
    }

    #[test]
    fn unmarked_class_is_byte_identical() {
        let bytes = stub_bytes(
            "com/example/Foo",
            ACC_PUBLIC | ACC_STATIC,
            "bar",
            "(I)V",
            Some(("Lcom/example/Other;", false)),
        );
        let mut class = read_class(&bytes).expect("read class");

        let changed = ExpectPlatform::default()
            .edit_class(&fabric(), "com/example/Foo", &mut class)
            .expect("edit class");

        assert!(!changed);
        assert_eq!(bytes, write_class(&class).expect("write class"));
    }

    #[test]
    fn legacy_markers_respect_their_annotation_lists() {
        let cases = [
            (EXPECT_PLATFORM_LEGACY, true, true),
            (EXPECT_PLATFORM_LEGACY, false, false),
            (EXPECT_PLATFORM_LEGACY2, false, true),
            (EXPECT_PLATFORM_LEGACY2, true, false),
            (EXPECT_PLATFORM, true, false),
        ];
        for (marker, visible, expected) in cases {
            let mut class = stub_class(
                "com/example/Foo",
                ACC_STATIC,
                "bar",
                "()V",
                Some((marker, visible)),
            );

            let changed = ExpectPlatform::default()
                .edit_class(&fabric(), "com/example/Foo", &mut class)
                .expect("edit class");

            assert_eq!(expected, changed, "{marker} visible={visible}");
        }
    }

    #[test]
    fn legacy_marker_takes_priority() {
        let mut writer = ClassWriter::new();
        writer.visit(V1_8, ACC_PUBLIC, "a/B", Some("java/lang/Object"));
        let mut method = writer.visit_method(ACC_STATIC, "run", "()V");
        method.visit_annotation(EXPECT_PLATFORM_LEGACY, true);
        method.visit_annotation(EXPECT_PLATFORM, false);
        method.visit_insn(opcodes::RETURN);
        let class = read_class(&writer.to_bytes().expect("write")).expect("read");

        assert_eq!(Some(MarkerKind::Legacy), detect_marker(&class.methods[0]));
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let mut class = stub_class(
            "com/example/Foo",
            ACC_PUBLIC | ACC_STATIC,
            "bar",
            "(IJ)V",
            Some((EXPECT_PLATFORM, false)),
        );
        let transformer = ExpectPlatform::default();
        let context = fabric();
        transformer
            .edit_class(&context, "com/example/Foo", &mut class)
            .expect("first pass");
        let once = write_class(&class).expect("write once");

        let mut reread = read_class(&once).expect("read");
        let changed = transformer
            .edit_class(&context, "com/example/Foo", &mut reread)
            .expect("second pass");

        assert!(!changed);
        assert_eq!(once, write_class(&reread).expect("write twice"));
        let transformed = reread.methods[0]
            .invisible_annotations
            .as_ref()
            .expect("annotations")
            .iter()
            .filter(|annotation| annotation.descriptor == EXPECT_PLATFORM_TRANSFORMED)
            .count();
        assert_eq!(1, transformed);
    }

    #[test]
    fn disabled_gate_skips_everything() {
        let mut class = stub_class(
            "com/example/Foo",
            ACC_STATIC,
            "bar",
            "()V",
            Some((EXPECT_PLATFORM, false)),
        );
        let context = context_with(&[
            (builtin::PLATFORM_NAME, "fabric"),
            (builtin::INJECT_INJECTABLES, "false"),
        ]);
        let transformer = ExpectPlatform::default();
        let mut sink = MemorySink::default();

        assert!(!transformer
            .edit_class(&context, "com/example/Foo", &mut class)
            .expect("edit class"));
        transformer
            .edit_assets(&context, &mut sink)
            .expect("edit assets");

        assert!(sink.entries.is_empty());
    }

    #[test]
    fn malformed_descriptor_is_fatal() {
        let mut class = stub_class(
            "com/example/Foo",
            ACC_STATIC,
            "bar",
            "(Q)V",
            Some((EXPECT_PLATFORM, false)),
        );

        let err = ExpectPlatform::default()
            .edit_class(&fabric(), "com/example/Foo", &mut class)
            .expect_err("malformed");

        assert!(matches!(err, Error::MalformedDescriptor(_)));
    }

    #[test]
    fn resolution_handles_aliases_and_default_package() {
        let context = context_with(&[(builtin::PLATFORM_NAME, "quilt")]);
        let slug = platform_slug(None, &context).expect("slug");

        assert_eq!("fabric", slug);
        assert_eq!("a/b/fabric/CDImpl", resolve_target("a/b/C$D", &slug));
        assert_eq!("fabric/MainImpl", resolve_target("Main", &slug));
        assert_eq!(
            "forge",
            platform_slug(None, &context_with(&[(builtin::PLATFORM_NAME, "forge")]))
                .expect("slug")
        );
        assert!(matches!(
            platform_slug(None, &context_with(&[])),
            Err(Error::MissingProperty(builtin::PLATFORM_NAME))
        ));
    }

    #[test]
    fn assets_emit_platform_methods_class() {
        let mut transformer = ExpectPlatform::default();
        transformer.supply_properties(&json!({ "architectury.unique.identifier": "acme" }));
        let mut sink = MemorySink::default();

        transformer
            .edit_assets(&fabric(), &mut sink)
            .expect("edit assets");

        assert_eq!(1, sink.entries.len());
        let (path, bytes) = &sink.entries[0];
        assert_eq!("acme/PlatformMethods.class", path);
        jclassfile::class_file::parse(bytes).expect("independent parser accepts helper");

        let class = read_class(bytes).expect("read helper");
        assert_eq!("acme/PlatformMethods", class.name);
        assert_eq!(V1_8, class.major_version);
        assert_eq!(ACC_PUBLIC | ACC_FINAL, class.access);
        assert_eq!(Some("java/lang/Object".to_string()), class.super_name);
        assert_eq!(1, class.methods.len());
        let method = class
            .method(GET_CURRENT_TARGET, GET_CURRENT_TARGET_DESCRIPTOR)
            .expect("getCurrentTarget");
        assert_eq!(ACC_PUBLIC | ACC_STATIC, method.access);

        let code = method.code.as_ref().expect("code");
        let Instruction::Raw(ldc) = &code.instructions[0] else {
            panic!("expected raw ldc");
        };
        assert_eq!(opcodes::LDC, ldc[0]);
        let Ok(Constant::String(utf8)) = class.constant_pool.get(u16::from(ldc[1])) else {
            panic!("expected string constant");
        };
        assert_eq!("fabric", class.constant_pool.utf8(*utf8).expect("utf8"));
        assert_eq!(Instruction::Raw(vec![opcodes::ARETURN]), code.instructions[1]);
    }

    #[test]
    fn assets_fall_back_to_context_identifier() {
        let mut sink = MemorySink::default();

        ExpectPlatform::default()
            .edit_assets(&fabric(), &mut sink)
            .expect("edit assets");

        assert_eq!(
            "architectury_inject_test/PlatformMethods.class",
            sink.entries[0].0
        );
    }

    #[test]
    fn assets_require_platform_name() {
        let mut sink = MemorySink::default();

        let err = ExpectPlatform::default()
            .edit_assets(&context_with(&[]), &mut sink)
            .expect_err("missing platform");

        assert!(matches!(err, Error::MissingProperty(_)));
        assert!(sink.entries.is_empty());
    }
}
