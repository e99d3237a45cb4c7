//! 动作编码表.
//!
//! 编码 ≥ 0x80 的动作带有 16 位长度和数据, 其余动作只有一个字节.

pub const END: u8 = 0x00;
pub const NEXT_FRAME: u8 = 0x04;
pub const PREVIOUS_FRAME: u8 = 0x05;
pub const PLAY: u8 = 0x06;
pub const STOP: u8 = 0x07;
pub const TOGGLE_QUALITY: u8 = 0x08;
pub const STOP_SOUNDS: u8 = 0x09;
pub const ADD: u8 = 0x0A;
pub const SUBTRACT: u8 = 0x0B;
pub const MULTIPLY: u8 = 0x0C;
pub const DIVIDE: u8 = 0x0D;
pub const EQUALS: u8 = 0x0E;
pub const LESS: u8 = 0x0F;
pub const AND: u8 = 0x10;
pub const OR: u8 = 0x11;
pub const NOT: u8 = 0x12;
pub const STRING_EQUALS: u8 = 0x13;
pub const STRING_LENGTH: u8 = 0x14;
pub const STRING_EXTRACT: u8 = 0x15;
pub const POP: u8 = 0x17;
pub const TO_INTEGER: u8 = 0x18;
pub const GET_VARIABLE: u8 = 0x1C;
pub const SET_VARIABLE: u8 = 0x1D;
pub const SET_TARGET2: u8 = 0x20;
pub const STRING_ADD: u8 = 0x21;
pub const GET_PROPERTY: u8 = 0x22;
pub const SET_PROPERTY: u8 = 0x23;
pub const CLONE_SPRITE: u8 = 0x24;
pub const REMOVE_SPRITE: u8 = 0x25;
pub const TRACE: u8 = 0x26;
pub const START_DRAG: u8 = 0x27;
pub const END_DRAG: u8 = 0x28;
pub const STRING_LESS: u8 = 0x29;
pub const THROW: u8 = 0x2A;
pub const CAST: u8 = 0x2B;
pub const IMPLEMENTS: u8 = 0x2C;
pub const FS_COMMAND2: u8 = 0x2D;
pub const RANDOM_NUMBER: u8 = 0x30;
pub const MB_STRING_LENGTH: u8 = 0x31;
pub const CHAR_TO_ASCII: u8 = 0x32;
pub const ASCII_TO_CHAR: u8 = 0x33;
pub const GET_TIME: u8 = 0x34;
pub const MB_STRING_EXTRACT: u8 = 0x35;
pub const MB_CHAR_TO_ASCII: u8 = 0x36;
pub const MB_ASCII_TO_CHAR: u8 = 0x37;
pub const DELETE: u8 = 0x3A;
pub const DELETE2: u8 = 0x3B;
pub const DEFINE_LOCAL: u8 = 0x3C;
pub const CALL_FUNCTION: u8 = 0x3D;
pub const RETURN: u8 = 0x3E;
pub const MODULO: u8 = 0x3F;
pub const NEW_OBJECT: u8 = 0x40;
pub const DEFINE_LOCAL2: u8 = 0x41;
pub const INIT_ARRAY: u8 = 0x42;
pub const INIT_OBJECT: u8 = 0x43;
pub const TYPE_OF: u8 = 0x44;
pub const TARGET_PATH: u8 = 0x45;
pub const ENUMERATE: u8 = 0x46;
pub const ADD2: u8 = 0x47;
pub const LESS2: u8 = 0x48;
pub const EQUALS2: u8 = 0x49;
pub const TO_NUMBER: u8 = 0x4A;
pub const TO_STRING: u8 = 0x4B;
pub const PUSH_DUPLICATE: u8 = 0x4C;
pub const SWAP: u8 = 0x4D;
pub const GET_MEMBER: u8 = 0x4E;
pub const SET_MEMBER: u8 = 0x4F;
pub const INCREMENT: u8 = 0x50;
pub const DECREMENT: u8 = 0x51;
pub const CALL_METHOD: u8 = 0x52;
pub const NEW_METHOD: u8 = 0x53;
pub const INSTANCE_OF: u8 = 0x54;
pub const ENUMERATE2: u8 = 0x55;
pub const BIT_AND: u8 = 0x60;
pub const BIT_OR: u8 = 0x61;
pub const BIT_XOR: u8 = 0x62;
pub const BIT_LSHIFT: u8 = 0x63;
pub const BIT_RSHIFT: u8 = 0x64;
pub const BIT_URSHIFT: u8 = 0x65;
pub const STRICT_EQUALS: u8 = 0x66;
pub const GREATER: u8 = 0x67;
pub const STRING_GREATER: u8 = 0x68;
pub const EXTENDS: u8 = 0x69;
pub const GOTO_FRAME: u8 = 0x81;
pub const GET_URL: u8 = 0x83;
pub const STORE_REGISTER: u8 = 0x87;
pub const CONSTANT_POOL: u8 = 0x88;
pub const STRICT_MODE: u8 = 0x89;
pub const WAIT_FOR_FRAME: u8 = 0x8A;
pub const SET_TARGET: u8 = 0x8B;
pub const GOTO_LABEL: u8 = 0x8C;
pub const WAIT_FOR_FRAME2: u8 = 0x8D;
pub const DEFINE_FUNCTION2: u8 = 0x8E;
pub const TRY: u8 = 0x8F;
pub const WITH: u8 = 0x94;
pub const PUSH: u8 = 0x96;
pub const JUMP: u8 = 0x99;
pub const GET_URL2: u8 = 0x9A;
pub const DEFINE_FUNCTION: u8 = 0x9B;
pub const IF: u8 = 0x9D;
pub const CALL: u8 = 0x9E;
pub const GOTO_FRAME2: u8 = 0x9F;

/// (编码, 名称, 最低版本)
pub const ACTIONS: &[(u8, &str, u8)] = &[
    (END, "End", 1),
    (NEXT_FRAME, "NextFrame", 1),
    (PREVIOUS_FRAME, "PreviousFrame", 1),
    (PLAY, "Play", 1),
    (STOP, "Stop", 1),
    (TOGGLE_QUALITY, "ToggleQuality", 1),
    (STOP_SOUNDS, "StopSounds", 2),
    (ADD, "Add", 4),
    (SUBTRACT, "Subtract", 4),
    (MULTIPLY, "Multiply", 4),
    (DIVIDE, "Divide", 4),
    (EQUALS, "Equals", 4),
    (LESS, "Less", 4),
    (AND, "And", 4),
    (OR, "Or", 4),
    (NOT, "Not", 4),
    (STRING_EQUALS, "StringEquals", 4),
    (STRING_LENGTH, "StringLength", 4),
    (STRING_EXTRACT, "StringExtract", 4),
    (POP, "Pop", 4),
    (TO_INTEGER, "ToInteger", 4),
    (GET_VARIABLE, "GetVariable", 4),
    (SET_VARIABLE, "SetVariable", 4),
    (SET_TARGET2, "SetTarget2", 4),
    (STRING_ADD, "StringAdd", 4),
    (GET_PROPERTY, "GetProperty", 4),
    (SET_PROPERTY, "SetProperty", 4),
    (CLONE_SPRITE, "CloneSprite", 4),
    (REMOVE_SPRITE, "RemoveSprite", 4),
    (TRACE, "Trace", 4),
    (START_DRAG, "StartDrag", 4),
    (END_DRAG, "EndDrag", 4),
    (STRING_LESS, "StringLess", 4),
    (THROW, "Throw", 7),
    (CAST, "Cast", 7),
    (IMPLEMENTS, "Implements", 7),
    (FS_COMMAND2, "FSCommand2", 6),
    (RANDOM_NUMBER, "RandomNumber", 4),
    (MB_STRING_LENGTH, "MBStringLength", 4),
    (CHAR_TO_ASCII, "CharToAscii", 4),
    (ASCII_TO_CHAR, "AsciiToChar", 4),
    (GET_TIME, "GetTime", 4),
    (MB_STRING_EXTRACT, "MBStringExtract", 4),
    (MB_CHAR_TO_ASCII, "MBCharToAscii", 4),
    (MB_ASCII_TO_CHAR, "MBAsciiToChar", 4),
    (DELETE, "Delete", 5),
    (DELETE2, "Delete2", 5),
    (DEFINE_LOCAL, "DefineLocal", 5),
    (CALL_FUNCTION, "CallFunction", 5),
    (RETURN, "Return", 5),
    (MODULO, "Modulo", 5),
    (NEW_OBJECT, "NewObject", 5),
    (DEFINE_LOCAL2, "DefineLocal2", 5),
    (INIT_ARRAY, "InitArray", 5),
    (INIT_OBJECT, "InitObject", 5),
    (TYPE_OF, "TypeOf", 5),
    (TARGET_PATH, "TargetPath", 5),
    (ENUMERATE, "Enumerate", 5),
    (ADD2, "Add2", 5),
    (LESS2, "Less2", 5),
    (EQUALS2, "Equals2", 5),
    (TO_NUMBER, "ToNumber", 5),
    (TO_STRING, "ToString", 5),
    (PUSH_DUPLICATE, "PushDuplicate", 5),
    (SWAP, "Swap", 5),
    (GET_MEMBER, "GetMember", 5),
    (SET_MEMBER, "SetMember", 5),
    (INCREMENT, "Increment", 5),
    (DECREMENT, "Decrement", 5),
    (CALL_METHOD, "CallMethod", 5),
    (NEW_METHOD, "NewMethod", 5),
    (INSTANCE_OF, "InstanceOf", 6),
    (ENUMERATE2, "Enumerate2", 6),
    (BIT_AND, "BitAnd", 5),
    (BIT_OR, "BitOr", 5),
    (BIT_XOR, "BitXor", 5),
    (BIT_LSHIFT, "BitLShift", 5),
    (BIT_RSHIFT, "BitRShift", 5),
    (BIT_URSHIFT, "BitURShift", 5),
    (STRICT_EQUALS, "StrictEquals", 6),
    (GREATER, "Greater", 6),
    (STRING_GREATER, "StringGreater", 6),
    (EXTENDS, "Extends", 7),
    (GOTO_FRAME, "GotoFrame", 1),
    (GET_URL, "GetURL", 1),
    (STORE_REGISTER, "StoreRegister", 5),
    (CONSTANT_POOL, "ConstantPool", 5),
    (STRICT_MODE, "StrictMode", 7),
    (WAIT_FOR_FRAME, "WaitForFrame", 1),
    (SET_TARGET, "SetTarget", 1),
    (GOTO_LABEL, "GotoLabel", 3),
    (WAIT_FOR_FRAME2, "WaitForFrame2", 4),
    (DEFINE_FUNCTION2, "DefineFunction2", 7),
    (TRY, "Try", 7),
    (WITH, "With", 5),
    (PUSH, "Push", 4),
    (JUMP, "Jump", 4),
    (GET_URL2, "GetURL2", 4),
    (DEFINE_FUNCTION, "DefineFunction", 5),
    (IF, "If", 4),
    (CALL, "Call", 4),
    (GOTO_FRAME2, "GotoFrame2", 4),
];

fn lookup(code: u8) -> Option<&'static (u8, &'static str, u8)> {
    ACTIONS.iter().find(|(c, _, _)| *c == code)
}

/// 动作名称
pub fn action_name(code: u8) -> Option<&'static str> {
    lookup(code).map(|(_, name, _)| *name)
}

/// 按名称查找动作编码, 不区分大小写
pub fn action_code(name: &str) -> Option<u8> {
    ACTIONS
        .iter()
        .find(|(_, n, _)| n.eq_ignore_ascii_case(name))
        .map(|(code, _, _)| *code)
}

/// 动作首次出现的 SWF 版本
pub fn action_version(code: u8) -> Option<u8> {
    lookup(code).map(|(_, _, version)| *version)
}

/// 动作是否带有长度和数据
pub fn has_payload(code: u8) -> bool {
    code >= 0x80
}
