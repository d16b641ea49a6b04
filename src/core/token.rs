/*
* epoll hands back one 64-bit word per ready descriptor (epoll_event.data).
* We use it to identify what became ready without a lookup:
*
* 1. Whether it is the shared listening socket or a client socket.
*
* 2. For client sockets, the slot of the stream in the worker's ClientTable.
*/

const KIND_BITS: u64 = 1;
const SLOT_BITS: u64 = 64 - KIND_BITS;

const KIND_MASK: u64 = (1 << KIND_BITS) - 1;                   // 0x01
const SLOT_MASK: u64 = (1 << SLOT_BITS) - 1;                   // 0x7FFF_FFFF_FFFF_FFFF

const KIND_SHIFT: u64 = 0;
const SLOT_SHIFT: u64 = KIND_SHIFT + KIND_BITS;                // 1

const KIND_LISTENER: u64 = 0;
const KIND_CLIENT: u64 = 1;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Token {
    Listener,
    Client(usize),
}

#[inline]
pub fn pack_token(token: Token) -> u64 {
    match token {
        Token::Listener => KIND_LISTENER,
        Token::Client(slot) => {
            let slot = slot as u64;
            debug_assert!((slot & !SLOT_MASK) == 0, "slot exceeds 63 bits");
            ((slot & SLOT_MASK) << SLOT_SHIFT) | (KIND_CLIENT << KIND_SHIFT)
        }
    }
}

#[inline]
pub fn unpack_token(data: u64) -> Token {
    match (data >> KIND_SHIFT) & KIND_MASK {
        KIND_LISTENER => Token::Listener,
        _ => Token::Client(((data >> SLOT_SHIFT) & SLOT_MASK) as usize),
    }
}
