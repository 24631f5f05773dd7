#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose whole remainder is one free-text value.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FieldCommandSpec {
    pub command: &'static str,
    pub action: &'static str,
    pub field: &'static str,
}

pub(crate) const STYLE_COMMAND: CommandSpec = CommandSpec {
    command: "style",
    action: "set_style",
};

pub(crate) const FIELD_COMMANDS: &[FieldCommandSpec] = &[
    FieldCommandSpec {
        command: "type",
        action: "set_clothing_detail",
        field: "item_type",
    },
    FieldCommandSpec {
        command: "material",
        action: "set_clothing_detail",
        field: "material",
    },
    FieldCommandSpec {
        command: "fit",
        action: "set_clothing_detail",
        field: "fit",
    },
    FieldCommandSpec {
        command: "description",
        action: "set_clothing_detail",
        field: "description",
    },
    FieldCommandSpec {
        command: "height",
        action: "set_measurement",
        field: "height",
    },
    FieldCommandSpec {
        command: "weight",
        action: "set_measurement",
        field: "weight",
    },
    FieldCommandSpec {
        command: "chest",
        action: "set_measurement",
        field: "chest",
    },
    FieldCommandSpec {
        command: "waist",
        action: "set_measurement",
        field: "waist",
    },
    FieldCommandSpec {
        command: "hips",
        action: "set_measurement",
        field: "hips",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "photo",
        action: "set_photo",
    },
    CommandSpec {
        command: "download",
        action: "download",
    },
];

pub(crate) const MULTI_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "clothing",
    action: "add_clothing",
}];

pub(crate) const INDEX_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "remove",
    action: "remove_clothing",
}];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "start",
        action: "start",
    },
    CommandSpec {
        command: "generate",
        action: "generate_avatar",
    },
    CommandSpec {
        command: "tryon",
        action: "try_on",
    },
    CommandSpec {
        command: "try_on",
        action: "try_on",
    },
    CommandSpec {
        command: "save",
        action: "save_result",
    },
    CommandSpec {
        command: "clear",
        action: "clear_try_on",
    },
    CommandSpec {
        command: "gallery",
        action: "show_gallery",
    },
    CommandSpec {
        command: "studio",
        action: "show_try_on",
    },
    CommandSpec {
        command: "new_avatar",
        action: "create_new_avatar",
    },
    CommandSpec {
        command: "start_over",
        action: "start_over",
    },
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub const STUDIO_HELP_COMMANDS: &[&str] = &[
    "/start",
    "/photo",
    "/style",
    "/generate",
    "/clothing",
    "/remove",
    "/type",
    "/material",
    "/fit",
    "/description",
    "/height",
    "/weight",
    "/chest",
    "/waist",
    "/hips",
    "/tryon",
    "/save",
    "/download",
    "/clear",
    "/gallery",
    "/studio",
    "/new_avatar",
    "/start_over",
    "/status",
    "/quit",
];
