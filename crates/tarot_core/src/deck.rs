//! crates/tarot_core/src/deck.rs
//!
//! The static 78-card deck and the draw operations over it.

use crate::domain::{Arcana, DrawnCard, Suit, TarotCard};
use rand::seq::SliceRandom;
use rand::Rng;

const MAJOR_ARCANA: [(&str, &str); 22] = [
    ("The Fool", "愚者"),
    ("The Magician", "魔术师"),
    ("The High Priestess", "女祭司"),
    ("The Empress", "皇后"),
    ("The Emperor", "皇帝"),
    ("The Hierophant", "教皇"),
    ("The Lovers", "恋人"),
    ("The Chariot", "战车"),
    ("Strength", "力量"),
    ("The Hermit", "隐士"),
    ("Wheel of Fortune", "命运之轮"),
    ("Justice", "正义"),
    ("The Hanged Man", "倒吊人"),
    ("Death", "死神"),
    ("Temperance", "节制"),
    ("The Devil", "恶魔"),
    ("The Tower", "高塔"),
    ("The Star", "星星"),
    ("The Moon", "月亮"),
    ("The Sun", "太阳"),
    ("Judgement", "审判"),
    ("The World", "世界"),
];

const SUITS: [(Suit, &str, &str); 4] = [
    (Suit::Wands, "Wands", "权杖"),
    (Suit::Cups, "Cups", "圣杯"),
    (Suit::Swords, "Swords", "宝剑"),
    (Suit::Pentacles, "Pentacles", "星币"),
];

const RANKS: [(&str, &str); 14] = [
    ("Ace", "王牌"),
    ("Two", "二"),
    ("Three", "三"),
    ("Four", "四"),
    ("Five", "五"),
    ("Six", "六"),
    ("Seven", "七"),
    ("Eight", "八"),
    ("Nine", "九"),
    ("Ten", "十"),
    ("Page", "侍从"),
    ("Knight", "骑士"),
    ("Queen", "王后"),
    ("King", "国王"),
];

/// Builds the full 78-card deck with stable ids (majors first, then each
/// suit in `SUITS` order, ace through king).
pub fn full_deck() -> Vec<TarotCard> {
    let mut deck = Vec::with_capacity(78);
    for (id, (name, name_cn)) in MAJOR_ARCANA.iter().enumerate() {
        deck.push(TarotCard {
            id: id as u8,
            name: (*name).to_string(),
            name_cn: (*name_cn).to_string(),
            arcana: Arcana::Major,
        });
    }
    let mut id = MAJOR_ARCANA.len() as u8;
    for (suit, suit_en, suit_cn) in SUITS {
        for (rank_en, rank_cn) in RANKS {
            deck.push(TarotCard {
                id,
                name: format!("{rank_en} of {suit_en}"),
                name_cn: format!("{suit_cn}{rank_cn}"),
                arcana: Arcana::Minor(suit),
            });
            id += 1;
        }
    }
    deck
}

/// Fisher-Yates shuffle over a fresh copy of the deck.
pub fn shuffled_deck<R: Rng>(rng: &mut R) -> Vec<TarotCard> {
    let mut deck = full_deck();
    deck.shuffle(rng);
    deck
}

/// Fixes a card's orientation at draw time: reversed with uniform 50%
/// probability, independent per card.
pub fn draw_with_orientation<R: Rng>(card: TarotCard, rng: &mut R) -> DrawnCard {
    DrawnCard {
        card,
        is_reversed: rng.gen_bool(0.5),
    }
}

/// Draws `count` cards off the top of a shuffled deck, assigning each an
/// orientation.
pub fn draw_cards<R: Rng>(rng: &mut R, count: usize) -> Vec<DrawnCard> {
    shuffled_deck(rng)
        .into_iter()
        .take(count)
        .map(|card| draw_with_orientation(card, rng))
        .collect()
}
